use filetime::FileTime;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use treesync_lib::core::{action_kinds, DiffState};
use treesync_lib::{
    diff_files, diff_files_with, ActionKind, DiffOptions, DirRef, EqualityKind, SyncConfig,
    SyncEngine, SyncError, SyncPriority, TreeDiff,
};

fn write(root: &Path, rel: &str, data: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

/// 写入内容相同、修改时间也相同的一对文件
fn write_identical(left: &Path, right: &Path, rel: &str, data: &str) {
    write(left, rel, data);
    write(right, rel, data);
    let mtime = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(left.join(rel), mtime).unwrap();
    filetime::set_file_mtime(right.join(rel), mtime).unwrap();
}

struct Trees {
    _tmp: TempDir,
    left: std::path::PathBuf,
    right: std::path::PathBuf,
}

fn trees() -> Trees {
    let tmp = TempDir::new().unwrap();
    let left = tmp.path().join("left");
    let right = tmp.path().join("right");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();
    Trees {
        _tmp: tmp,
        left,
        right,
    }
}

fn populate_five_items(t: &Trees) {
    write(&t.left, "leftSubdir/leftOnly.txt", "left only");
    write(&t.right, "rightSubdir/rightOnly.txt", "right only");
    write(&t.left, "both/both.txt", "left version");
    write(&t.right, "both/both.txt", "right version, longer");
    write(&t.left, "zCommonDir/commonDirLeftUnique.txt", "l");
    write(&t.right, "zCommonDir/commonDirRightUnique.txt", "r");
}

#[tokio::test]
async fn diff_lists_five_items_sorted_by_path() {
    let t = trees();
    populate_five_items(&t);

    let items = diff_files(&t.left, &t.right, false).await.unwrap();

    let paths: Vec<&str> = items.iter().map(|i| i.path().as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "both/both.txt",
            "leftSubdir/leftOnly.txt",
            "rightSubdir/rightOnly.txt",
            "zCommonDir/commonDirLeftUnique.txt",
            "zCommonDir/commonDirRightUnique.txt",
        ]
    );

    assert!(items[0].is_both());
    assert!(items[1].is_x_only());
    assert!(items[2].is_y_only());
    assert!(items[3].is_x_only());
    assert!(items[4].is_y_only());
}

#[tokio::test]
async fn executing_left_to_right_actions_mirrors_left() {
    let t = trees();
    write(&t.left, "leftOnly.txt", "from left");
    write(&t.left, "both.txt", "left content");
    write(&t.right, "both.txt", "right content!");
    write(&t.right, "rightOnly.txt", "from right");

    let items = diff_files(&t.left, &t.right, false).await.unwrap();
    assert_eq!(items.len(), 3);

    for item in &items {
        let actions = item.actions(SyncPriority::PreferX).await.unwrap();
        actions[0].execute().await.unwrap();
    }

    // 左侧不变
    assert_eq!(read(&t.left, "leftOnly.txt"), "from left");
    assert_eq!(read(&t.left, "both.txt"), "left content");
    assert!(!t.left.join("rightOnly.txt").exists());

    assert_eq!(read(&t.right, "leftOnly.txt"), "from left");
    assert_eq!(read(&t.right, "both.txt"), "left content");
    assert!(!t.right.join("rightOnly.txt").exists());
}

#[tokio::test]
async fn double_flip_restores_diff() {
    let t = trees();
    populate_five_items(&t);

    let diff = TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap();
    let flipped = diff.flip();
    let restored = flipped.flip();

    assert_eq!(flipped.x_root(), diff.y_root());
    assert_eq!(restored.x_root(), diff.x_root());
    assert_eq!(restored.y_root(), diff.y_root());
    assert_eq!(restored.items(), diff.items());

    for (original, swapped) in diff.items().iter().zip(flipped.items()) {
        assert_eq!(original.is_x_only(), swapped.is_y_only());
        assert_eq!(original.x(), swapped.y());
    }
}

#[tokio::test]
async fn every_item_has_exactly_one_classification() {
    let t = trees();
    populate_five_items(&t);
    write_identical(&t.left, &t.right, "same.txt", "same");

    let diff = TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap();

    assert_eq!(diff.len(), 6);
    for item in diff.items() {
        let flags = [item.is_x_only(), item.is_y_only(), item.is_both()];
        assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{}", item.path());
        assert!(item.x().is_extant() || item.y().is_extant());
    }
}

#[tokio::test]
async fn both_different_action_order_per_priority() {
    let t = trees();
    write(&t.left, "f.txt", "one");
    write(&t.right, "f.txt", "three");

    let items = diff_files(&t.left, &t.right, false).await.unwrap();
    let item = &items[0];
    assert_eq!(item.state().await.unwrap(), DiffState::BothDifferent);

    let kinds = |actions: Vec<treesync_lib::Action>| -> Vec<ActionKind> {
        actions.iter().map(|a| a.kind()).collect()
    };

    assert_eq!(
        kinds(item.actions(SyncPriority::PreferX).await.unwrap()),
        vec![
            ActionKind::CopyToY,
            ActionKind::Skip,
            ActionKind::CopyToX,
            ActionKind::DeleteBoth
        ]
    );
    assert_eq!(
        kinds(item.actions(SyncPriority::Preserve).await.unwrap()),
        vec![
            ActionKind::CopyToY,
            ActionKind::CopyToX,
            ActionKind::Skip,
            ActionKind::DeleteBoth
        ]
    );
    assert_eq!(
        kinds(item.actions(SyncPriority::PreferY).await.unwrap()),
        action_kinds(DiffState::BothDifferent, SyncPriority::PreferY).to_vec()
    );
}

#[tokio::test]
async fn sync_left_to_right_is_idempotent() {
    let t = trees();
    populate_five_items(&t);

    let x = DirRef::new(&t.left);
    let y = DirRef::new(&t.right);
    let report = TreeDiff::create(&x, &y)
        .await
        .unwrap()
        .sync_x_to_y()
        .await
        .unwrap();

    assert_eq!(report.files_copied, 3);
    assert_eq!(report.files_deleted, 2);
    assert!(!t.right.join("rightSubdir/rightOnly.txt").exists());
    assert!(!t.right.join("zCommonDir/commonDirRightUnique.txt").exists());

    let after = TreeDiff::create(&x, &y).await.unwrap();
    assert_eq!(after.len(), 3);
    for item in after.items() {
        assert_eq!(item.state().await.unwrap(), DiffState::BothEqual);
    }
    assert!(diff_files(&t.left, &t.right, false).await.unwrap().is_empty());

    let again = after.sync_x_to_y().await.unwrap();
    assert_eq!(again.files_copied, 0);
    assert_eq!(again.files_deleted, 0);
    assert_eq!(again.files_unchanged, 3);
}

#[tokio::test]
async fn sync_right_to_left_mirrors_right() {
    let t = trees();
    populate_five_items(&t);

    let diff = TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap();
    diff.sync_y_to_x().await.unwrap();

    assert_eq!(read(&t.left, "both/both.txt"), "right version, longer");
    assert_eq!(read(&t.left, "rightSubdir/rightOnly.txt"), "right only");
    assert!(!t.left.join("leftSubdir/leftOnly.txt").exists());
    assert!(!t.left.join("zCommonDir/commonDirLeftUnique.txt").exists());
    // 右侧保持不变
    assert_eq!(read(&t.right, "both/both.txt"), "right version, longer");
}

#[tokio::test]
async fn identical_files_are_suppressed_unless_requested() {
    let t = trees();
    write_identical(&t.left, &t.right, "same.txt", "identical content");
    write(&t.left, "other.txt", "left");

    let items = diff_files(&t.left, &t.right, false).await.unwrap();
    let paths: Vec<&str> = items.iter().map(|i| i.path().as_str()).collect();
    assert_eq!(paths, vec!["other.txt"]);

    let items = diff_files(&t.left, &t.right, true).await.unwrap();
    assert_eq!(items.len(), 2);
    let same = items.iter().find(|i| i.path().as_str() == "same.txt").unwrap();
    for priority in SyncPriority::ALL {
        assert!(same.actions(priority).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn content_strategy_ignores_modification_time() {
    let t = trees();
    write(&t.left, "f.txt", "same bytes");
    write(&t.right, "f.txt", "same bytes");
    filetime::set_file_mtime(t.left.join("f.txt"), FileTime::from_unix_time(1_000, 0)).unwrap();
    filetime::set_file_mtime(t.right.join("f.txt"), FileTime::from_unix_time(2_000, 0)).unwrap();

    let by_fingerprint = diff_files(&t.left, &t.right, false).await.unwrap();
    assert_eq!(by_fingerprint.len(), 1);

    let options = DiffOptions {
        equality: EqualityKind::Content,
        ..Default::default()
    };
    let by_content = diff_files_with(&t.left, &t.right, false, &options)
        .await
        .unwrap();
    assert!(by_content.is_empty());
}

#[tokio::test]
async fn equality_reports_errors_as_values_and_sync_fails_loudly() {
    let t = trees();
    write(&t.left, "a.txt", "left a");
    write(&t.right, "a.txt", "right a!");
    write(&t.left, "b.txt", "left b");

    let diff = TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap();

    // 差异计算之后删除源文件
    fs::remove_file(t.left.join("a.txt")).unwrap();

    let a = diff
        .items()
        .iter()
        .find(|i| i.path().as_str() == "a.txt")
        .unwrap();
    let compared = a.sides_equal().await;
    assert!(matches!(compared, Err(ref e) if e.is_not_found()));

    let result = diff.sync_x_to_y().await;
    match result {
        Err(SyncError::Batch { phase, failed, .. }) => {
            assert_eq!(phase, "copy");
            assert_eq!(failed, 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // 同一批次中的其他操作仍然完成
    assert_eq!(read(&t.right, "b.txt"), "left b");
}

#[tokio::test]
async fn blocking_file_on_y_is_deleted_before_nested_copy() {
    let t = trees();
    // Y 上的文件 `a` 占据了 X 中目录 `a` 的位置
    write(&t.right, "a", "plain file");
    write(&t.left, "a/x", "nested");

    let diff = TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap();
    let report = diff.sync_x_to_y().await.unwrap();

    assert_eq!(report.files_deleted, 1);
    assert_eq!(report.files_copied, 1);
    assert!(t.right.join("a").is_dir());
    assert_eq!(read(&t.right, "a/x"), "nested");
    assert!(diff_files(&t.left, &t.right, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn files_named_like_copy_temporaries_survive_repeated_sync() {
    let t = trees();
    write(&t.left, "foo", "v1");
    write(&t.left, ".foo.treesync.tmp", "user data");

    let engine = SyncEngine::with_config(SyncConfig {
        max_concurrent_ops: 1,
    });
    let x = DirRef::new(&t.left);
    let y = DirRef::new(&t.right);

    engine
        .sync_x_to_y(&TreeDiff::create(&x, &y).await.unwrap())
        .await
        .unwrap();
    write(&t.left, "foo", "version two");
    engine
        .sync_x_to_y(&TreeDiff::create(&x, &y).await.unwrap())
        .await
        .unwrap();

    assert_eq!(read(&t.right, "foo"), "version two");
    assert_eq!(read(&t.right, ".foo.treesync.tmp"), "user data");
    assert!(diff_files(&t.left, &t.right, false).await.unwrap().is_empty());

    let mut names: Vec<String> = fs::read_dir(&t.right)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![".foo.treesync.tmp", "foo"]);
}

#[cfg(unix)]
#[tokio::test]
async fn backslash_in_name_does_not_merge_with_nested_path() {
    let t = trees();
    write(&t.left, "a/b.txt", "real nested");
    fs::write(t.left.join("a\\b.txt"), "backslash name").unwrap();

    let diff = TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap();
    assert_eq!(diff.len(), 2);

    diff.sync_x_to_y().await.unwrap();

    assert_eq!(read(&t.right, "a/b.txt"), "real nested");
    assert_eq!(
        fs::read_to_string(t.right.join("a\\b.txt")).unwrap(),
        "backslash name"
    );
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn non_utf8_names_are_diffed_and_synced() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let t = trees();
    let name = OsStr::from_bytes(b"caf\xE9.txt");
    write(&t.left, "ok.txt", "ok");
    fs::write(t.left.join(name), "latin1").unwrap();

    let items = diff_files(&t.left, &t.right, false).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.is_x_only()));

    TreeDiff::create(&DirRef::new(&t.left), &DirRef::new(&t.right))
        .await
        .unwrap()
        .sync_x_to_y()
        .await
        .unwrap();

    assert_eq!(fs::read(t.right.join(name)).unwrap(), b"latin1");
    assert!(diff_files(&t.left, &t.right, false).await.unwrap().is_empty());
}
