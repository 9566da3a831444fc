// 影响协调器 - 对每条变更记录驱动模式生成与使用扫描，合并结果

use std::collections::BTreeMap;

use crate::breaking_changes::ChangeRecord;

use super::{generate_patterns, UsageLocation, UsageScanner};

/// 对全部变更记录计算使用影响。
///
/// 逐条记录生成搜索模式并扫描候选文件（单条记录内部的文件循环
/// 是并行的）；检测到使用的记录以 `"<文件>:<元素>"` 为键写入返回
/// 的映射，同时把涉及的文件并入记录自身的 `affected_files`。
/// 没有检测到使用的变更记录照常保留——使用情况只影响严重度与
/// 退出码策略，不会抹掉变更本身。
pub async fn compute_impact(
    records: &mut [ChangeRecord],
    candidate_files: &[String],
    scanner: &UsageScanner,
    module_root_prefix: &str,
) -> BTreeMap<String, Vec<UsageLocation>> {
    let mut usage_map = BTreeMap::new();

    for record in records.iter_mut() {
        let patterns = generate_patterns(&record.element_name, &record.file_path, module_root_prefix);
        let locations = scanner
            .scan(&patterns, candidate_files, &record.file_path)
            .await;

        tracing::debug!(
            "元素 {} 检测到 {} 处使用",
            record.element_name,
            locations.len()
        );

        if locations.is_empty() {
            continue;
        }
        for location in &locations {
            record.affected_files.insert(location.file_path.clone());
        }
        usage_map.insert(record.usage_key(), locations);
    }

    usage_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structural::extract;
    use crate::usage_impact::FsReader;
    use std::fs;
    use std::sync::Arc;

    fn change_record_for(old: &str, new: &str, file_path: &str) -> Vec<ChangeRecord> {
        let old_model = extract(old, file_path).unwrap();
        let new_model = extract(new, file_path).unwrap();
        crate::breaking_changes::diff(&old_model, &new_model, file_path)
    }

    #[tokio::test]
    async fn test_impact_fills_affected_files_and_map() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("net")).unwrap();
        fs::write(
            dir.path().join("consumer.py"),
            "from net.ssh import connect\n\nconnect('db')\n",
        )
        .unwrap();

        let mut records = change_record_for(
            "def connect(host, port=22):\n    pass\n",
            "def connect(host, port):\n    pass\n",
            "net/ssh.py",
        );
        assert_eq!(records.len(), 1);

        let scanner = UsageScanner::new(Arc::new(FsReader::new(dir.path())), 2);
        let usage_map = compute_impact(
            &mut records,
            &["consumer.py".to_string()],
            &scanner,
            "src",
        )
        .await;

        let key = "net/ssh.py:connect";
        assert!(usage_map.contains_key(key));
        assert!(records[0].affected_files.contains("consumer.py"));
    }

    #[tokio::test]
    async fn test_record_without_usage_is_kept_out_of_map() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other.py"), "x = 1\n").unwrap();

        let mut records = change_record_for(
            "def obscure_helper_name(a):\n    pass\n",
            "",
            "net/ssh.py",
        );
        assert_eq!(records.len(), 1);

        let scanner = UsageScanner::new(Arc::new(FsReader::new(dir.path())), 2);
        let usage_map =
            compute_impact(&mut records, &["other.py".to_string()], &scanner, "src").await;

        assert!(usage_map.is_empty());
        assert!(records[0].affected_files.is_empty());
        // 记录本身仍然保留
        assert_eq!(records.len(), 1);
    }
}
