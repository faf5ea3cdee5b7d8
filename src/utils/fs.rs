//! IO helper: safe file read/write for JSON / YAML

use std::{fs::File, io::BufReader, path::Path};

use serde::{de::DeserializeOwned, Serialize};

use crate::model::data_core::AppError;

fn is_yaml(p: &Path) -> bool {
    matches!(
        p.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// 按扩展名读取：`.yaml`/`.yml` 走 YAML，其余按 JSON
pub fn read_data_file<T: DeserializeOwned>(p: &Path) -> Result<T, AppError> {
    let f = File::open(p)?;
    let rdr = BufReader::new(f);
    let v = if is_yaml(p) {
        serde_yaml::from_reader(rdr)?
    } else {
        serde_json::from_reader(rdr)?
    };
    Ok(v)
}

/// 将数据保存到文件（格式化输出）
pub fn write_json_file<T: Serialize>(p: &Path, value: &T) -> Result<(), AppError> {
    let f = File::create(p)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_read_yaml_and_json() {
        let mut yaml = Builder::new().suffix(".yml").tempfile().unwrap();
        yaml.write_all(b"a: '1'\nb: '2'\n").unwrap();
        let from_yaml: BTreeMap<String, String> = read_data_file(yaml.path()).unwrap();
        assert_eq!(from_yaml.get("b").map(String::as_str), Some("2"));

        let mut json = Builder::new().suffix(".json").tempfile().unwrap();
        json.write_all(br#"{"a": "1"}"#).unwrap();
        let from_json: BTreeMap<String, String> = read_data_file(json.path()).unwrap();
        assert_eq!(from_json.len(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let out = Builder::new().suffix(".json").tempfile().unwrap();
        let data = vec!["Mesh".to_string(), "Outputs".to_string()];
        write_json_file(out.path(), &data).unwrap();
        let back: Vec<String> = read_data_file(out.path()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<Vec<String>, _> = read_data_file(Path::new("/nonexistent/schema.yaml"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
