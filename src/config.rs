//! Environment-derived configuration (spec §6: "Environment variables").
//!
//! Resolved once per emission and threaded through explicitly, rather than
//! re-read inside each emitter — this is what makes a build reproducible
//! for a fixed environment snapshot.

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

/// The effective "now", honoring `SOURCE_DATE_EPOCH` when set and parseable.
///
/// Used anywhere a modification time needs a default: synthesized implicit
/// directories, a `Package::mtime` left unset by the caller.
#[must_use]
pub fn source_date_epoch() -> i64 {
    if let Ok(val) = env::var("SOURCE_DATE_EPOCH") {
        if let Ok(parsed) = val.trim().parse::<i64>() {
            return parsed;
        }
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Resolves a signing passphrase for the given format, checking
/// `NFPM_<FORMAT>_PASSPHRASE` before falling back to `NFPM_PASSPHRASE`.
///
/// `format_name` should be the upper-cased format tag, e.g. `"DEB"`, `"RPM"`,
/// `"APK"`.
#[must_use]
pub fn passphrase(format_name: &str) -> Option<String> {
    let scoped = format!("NFPM_{format_name}_PASSPHRASE");
    env::var(scoped)
        .ok()
        .or_else(|| env::var("NFPM_PASSPHRASE").ok())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // SOURCE_DATE_EPOCH and NFPM_* mutate process-global state; serialize
    // the tests that touch them so they don't clobber each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn honors_source_date_epoch() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("SOURCE_DATE_EPOCH", "1700000000");
        assert_eq!(source_date_epoch(), 1_700_000_000);
        env::remove_var("SOURCE_DATE_EPOCH");
    }

    #[test]
    fn falls_back_through_passphrase_chain() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("NFPM_APK_PASSPHRASE");
        env::remove_var("NFPM_PASSPHRASE");
        assert_eq!(passphrase("APK"), None);

        env::set_var("NFPM_PASSPHRASE", "generic");
        assert_eq!(passphrase("APK"), Some("generic".to_string()));

        env::set_var("NFPM_APK_PASSPHRASE", "specific");
        assert_eq!(passphrase("APK"), Some("specific".to_string()));

        env::remove_var("NFPM_APK_PASSPHRASE");
        env::remove_var("NFPM_PASSPHRASE");
    }
}
