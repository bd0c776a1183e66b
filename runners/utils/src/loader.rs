//! 从环境变量构建 [`BatchRequest`].
//!
//! | 变量                 | 含义                         | 缺省值                          |
//! |----------------------|------------------------------|---------------------------------|
//! | `BAT_LOW_PRE_DIR`    | 80KV 氙气吸入前切片目录      | `$HOME/dataset/scans/80KV_PRE`  |
//! | `BAT_LOW_POST_DIR`   | 80KV 氙气吸入后切片目录      | `$HOME/dataset/scans/80KV_POST` |
//! | `BAT_HIGH_PRE_DIR`   | 140KV 氙气吸入前切片目录     | `$HOME/dataset/scans/140KV_PRE` |
//! | `BAT_HIGH_POST_DIR`  | 140KV 氙气吸入后切片目录     | `$HOME/dataset/scans/140KV_POST`|
//! | `BAT_BATCH_NAME`     | 批次名                       | `batch`                         |
//! | `BAT_START_SCAN`     | 起始切片序号 (1 起始)        | `1`                             |
//! | `BAT_END_SCAN`       | 终止切片序号 (含)            | `250`                           |
//! | `BAT_INDEX`          | 展示用切片序号               | `200`                           |
//! | `BAT_TRIM`           | 裁剪区域 `上 下 左 右`       | 不裁剪                          |
//! | `BAT_REGISTER`       | `1` 开启配准, `0` 关闭       | `0`                             |
//! | `BAT_OUTPUT_DIR`     | 输出目录                     | `$HOME/dataset/output`          |

use bat_berry::dataset::home_dataset_dir_with;
use bat_berry::pipeline::{BatchRequest, ConfigError};
use bat_berry::Channel;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// 获取目录.
///
/// 1. 若环境变量 `var` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/{rest...}`.
pub fn dir_from_env_or_home(var: &str, rest: &[&str]) -> PathBuf {
    match env::var(var) {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => home_dataset_dir_with(rest).unwrap(),
    }
}

/// `channel` 通道的输入目录.
pub fn scan_dir_from_env_or_home(channel: Channel) -> PathBuf {
    let (var, sub) = match channel {
        Channel::LowPre => ("BAT_LOW_PRE_DIR", "80KV_PRE"),
        Channel::LowPost => ("BAT_LOW_POST_DIR", "80KV_POST"),
        Channel::HighPre => ("BAT_HIGH_PRE_DIR", "140KV_PRE"),
        Channel::HighPost => ("BAT_HIGH_POST_DIR", "140KV_POST"),
    };
    dir_from_env_or_home(var, &["scans", sub])
}

/// 输出目录.
#[inline]
pub fn output_dir_from_env_or_home() -> PathBuf {
    dir_from_env_or_home("BAT_OUTPUT_DIR", &["output"])
}

/// 读取数值环境变量. 未设置时返回 `default`, 无法解析时程序 panic.
fn parse_env<T: FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("`${var}` is not a valid number: {v:?}")),
        _ => default,
    }
}

/// 解析 `上 下 左 右` 形式的裁剪区域 (空白或逗号分隔).
pub fn parse_trim(s: &str) -> Option<[usize; 4]> {
    let v: Vec<usize> = s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    v.try_into().ok()
}

/// 从环境变量构建并校验批次配置.
///
/// # 注意
///
/// 数值变量无法解析, 或 `$BAT_TRIM` 不是 4 个非负整数时程序 panic.
pub fn request_from_env_or_home() -> Result<BatchRequest, ConfigError> {
    let name = env::var("BAT_BATCH_NAME").unwrap_or_else(|_| "batch".to_string());
    let start = parse_env("BAT_START_SCAN", 1);
    let end = parse_env("BAT_END_SCAN", 250);
    let index = parse_env("BAT_INDEX", 200);
    let register = parse_env::<u8>("BAT_REGISTER", 0) != 0;

    let mut builder = BatchRequest::builder(name)
        .dirs(Channel::ALL.map(scan_dir_from_env_or_home))
        .window(start, end)
        .display_index(index)
        .register(register);
    if let Ok(t) = env::var("BAT_TRIM") {
        if !t.trim().is_empty() {
            let trim = parse_trim(&t)
                .unwrap_or_else(|| panic!("`$BAT_TRIM` must be 4 integers `top bottom left right`: {t:?}"));
            builder = builder.trim(trim);
        }
    }
    builder.build()
}
