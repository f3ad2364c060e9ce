//! 工作指令相关领域模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 示例训练数据地址
pub const EXAMPLE_DATA_URL: &str = "https://pjreddie.com/media/files/mnist_train.csv";

/// 工作指令
///
/// 由 sender 构建，executor 原样执行 `command`，不做任何校验。
/// 缺失的字段一律为空字符串
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInstruction {
    /// 数据源地址
    #[serde(default)]
    pub data_url: String,
    /// 模型源地址（可为空）
    #[serde(default)]
    pub model_url: String,
    /// 交给本地 shell 的命令文本
    #[serde(default)]
    pub command: String,
}

impl WorkInstruction {
    pub fn new(
        data_url: impl Into<String>,
        model_url: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            data_url: data_url.into(),
            model_url: model_url.into(),
            command: command.into(),
        }
    }

    /// 宽松解码 `/execute` 请求体
    ///
    /// - 只取第一个 JSON 值，其后的内容忽略
    /// - `null` 视为全部字段为空的指令
    /// - 字段名不区分大小写（`Command` 与 `command` 等价）
    ///
    /// 空请求体、语法错误、非对象值、字段类型不符仍然报错
    pub fn decode(body: &[u8]) -> serde_json::Result<Self> {
        let first = serde_json::Deserializer::from_slice(body)
            .into_iter::<Value>()
            .next();

        match first {
            Some(Ok(Value::Null)) => Ok(Self::default()),
            Some(Ok(Value::Object(fields))) => {
                serde_json::from_value(Value::Object(fold_keys(fields)))
            }
            Some(Ok(_)) => Err(serde::de::Error::custom("expected a JSON object")),
            Some(Err(e)) => Err(e),
            // 只有空白: 让 serde_json 给出 EOF 错误
            None => serde_json::from_slice(body),
        }
    }

    /// sender 发送的固定示例指令
    pub fn training_example() -> Self {
        Self::new(
            EXAMPLE_DATA_URL,
            "",
            format!("python src/train.py --data_url {}", EXAMPLE_DATA_URL),
        )
    }
}

/// 字段名转小写，仅大小写不同的重复字段只保留一个
fn fold_keys(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect()
}

/// 后台命令执行完成后的报告
///
/// 只在进程内广播（日志、测试），不会返回给 HTTP 调用方
#[derive(Clone, Debug)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub command: String,
    pub success: bool,
    /// 被信号终止时为 None
    pub exit_code: Option<i32>,
    /// stdout + stderr
    pub output: String,
}
