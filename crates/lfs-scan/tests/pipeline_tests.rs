//! End-to-end scans against a real throwaway git repository.
//!
//! The scan pipelines run `git` in the process's working directory, so
//! everything lives in one test function: we chdir into a fresh repo once
//! and run both scans there. Skipped when no `git` binary is available.

use std::fs;
use std::process::Command;

use bstr::BString;
use lfs_scan::{scan_tree, scan_unpushed, Completion};
use lfs_utils::filter::PathFilter;

const OID: &str = "f5d84da40ab1f6aa28df2b2bf1ade2cdcd4397133f903c12b4106641b10e1ed6";

fn pointer_body(size: u64) -> String {
    format!("version https://git-lfs.github.com/spec/v1\noid sha256:{OID}\nsize {size}\n")
}

fn git(dir: &std::path::Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=scan test",
            "-c",
            "user.email=scan@example.invalid",
        ])
        .args(args)
        .status()
        .expect("git invocation failed");
    assert!(status.success(), "git {args:?} failed");
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn tree_and_unpushed_scans_on_a_real_repository() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    git(root, &["init", "-q"]);

    // Two paths with identical pointer content (same backing blob), one
    // oversized non-pointer, one small non-pointer.
    fs::write(root.join("a.bin"), pointer_body(1289)).unwrap();
    fs::create_dir(root.join("dir")).unwrap();
    fs::write(root.join("dir/b.bin"), pointer_body(1289)).unwrap();
    fs::write(root.join("big.bin"), "x".repeat(4096)).unwrap();
    fs::write(root.join("note.txt"), "plain text\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "add pointers"]);

    std::env::set_current_dir(root).unwrap();

    // Tree scan: both paths reported despite identical content, in tree
    // listing order, each decodable with matching sizes.
    let scan = scan_tree("HEAD").expect("scan_tree failed to start");
    assert_eq!(scan.completion, Completion::Complete);
    let names: Vec<BString> = scan.pointers.iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec![BString::from("a.bin"), BString::from("dir/b.bin")]);
    for p in &scan.pointers {
        assert_eq!(p.size, p.pointer.size);
        assert_eq!(p.pointer.oid, OID);
        let sha1 = p.sha1.as_deref().expect("tree scan results carry a blob id");
        assert_eq!(sha1.len(), 40);
    }
    // Same content, same backing blob.
    assert_eq!(scan.pointers[0].sha1, scan.pointers[1].sha1);

    // No remote exists, so the commit is unpushed and both additions show up.
    let scan = scan_unpushed(PathFilter::accept_all()).expect("scan_unpushed failed to start");
    assert_eq!(scan.completion, Completion::Complete);
    let mut names: Vec<BString> = scan.pointers.iter().map(|p| p.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec![BString::from("a.bin"), BString::from("dir/b.bin")]);
    assert!(scan.pointers.iter().all(|p| p.sha1.is_none()));

    // Path filtering applies to the log scan surface.
    let filter = PathFilter::new(vec![], vec![BString::from("dir")]);
    let scan = scan_unpushed(filter).expect("scan_unpushed failed to start");
    let names: Vec<BString> = scan.pointers.iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec![BString::from("a.bin")]);
}
