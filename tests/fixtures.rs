//! Shared builders for the per-emitter integration tests (spec §8
//! "End-to-end scenarios"). Every test builds its `Package` in memory and
//! writes source files into a scratch directory under `std::env::temp_dir`
//! rather than shelling out to any host packaging tool.

use std::io::Write;
use std::path::PathBuf;

use packager::model::{ContentEntry, ContentType, Package};

/// A scratch directory removed on drop, holding the host files a test's
/// content entries point at.
pub struct Scratch {
    pub dir: PathBuf,
}

impl Scratch {
    pub fn new(label: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("packager-itest-{label}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Scenario 1 ("Minimal deb/apk/rpm/arch"): name `foo`, version `1.0.0`,
/// one regular file `hello` (content `"hi\n"`) destined `/usr/bin/hello`.
pub fn minimal_package(scratch: &Scratch) -> Package {
    let hello = scratch.write("hello", b"hi\n");

    let mut pkg = Package::new("foo", "1.0.0");
    pkg.arch = "amd64".to_string();
    pkg.description = "a minimal test package".to_string();
    pkg.mtime = Some(1_700_000_000);
    pkg.contents.push(ContentEntry::new(hello, "/usr/bin/hello", ContentType::Regular));
    pkg
}
