use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{FileStoreError, FileStoreResult};

/// Worker标识（由Worker自行选择，注册时提交）
pub type WorkerId = String;

/// 作业命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    UploadInit,
    UploadData,
    List,
    DeleteInit,
    DeleteConfirm,
    Download,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::UploadInit => "upload_init",
            Command::UploadData => "upload_data",
            Command::List => "list",
            Command::DeleteInit => "delete_init",
            Command::DeleteConfirm => "delete_confirm",
            Command::Download => "download",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 作业请求负载，每个命令只携带自己需要的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRequest {
    UploadInit {
        file_name: String,
        file_size: u64,
        #[serde(default)]
        high_reliability: bool,
    },
    UploadData {
        file_name: String,
        file_contents: Vec<u8>,
        #[serde(default)]
        high_reliability: bool,
    },
    List,
    DeleteInit {
        file_name: String,
    },
    DeleteConfirm {
        file_name: String,
        confirmed: bool,
    },
    Download {
        file_name: String,
    },
}

impl JobRequest {
    pub fn command(&self) -> Command {
        match self {
            JobRequest::UploadInit { .. } => Command::UploadInit,
            JobRequest::UploadData { .. } => Command::UploadData,
            JobRequest::List => Command::List,
            JobRequest::DeleteInit { .. } => Command::DeleteInit,
            JobRequest::DeleteConfirm { .. } => Command::DeleteConfirm,
            JobRequest::Download { .. } => Command::Download,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            JobRequest::UploadInit { file_name, .. }
            | JobRequest::UploadData { file_name, .. }
            | JobRequest::DeleteInit { file_name }
            | JobRequest::DeleteConfirm { file_name, .. }
            | JobRequest::Download { file_name } => Some(file_name),
            JobRequest::List => None,
        }
    }

    /// 上传类命令是否使用高可靠（全量复制）模式
    pub fn high_reliability(&self) -> bool {
        match self {
            JobRequest::UploadInit {
                high_reliability, ..
            }
            | JobRequest::UploadData {
                high_reliability, ..
            } => *high_reliability,
            _ => false,
        }
    }

    /// 去掉上传内容后的请求副本，用于结果回传
    pub fn without_contents(&self) -> Self {
        match self {
            JobRequest::UploadData {
                file_name,
                high_reliability,
                ..
            } => JobRequest::UploadData {
                file_name: file_name.clone(),
                file_contents: Vec::new(),
                high_reliability: *high_reliability,
            },
            other => other.clone(),
        }
    }

    /// 校验负载字段
    pub fn validate(&self) -> FileStoreResult<()> {
        if let Some(name) = self.file_name() {
            if name.trim().is_empty() {
                return Err(FileStoreError::InvalidJob(format!(
                    "{} 缺少文件名",
                    self.command()
                )));
            }
        }
        Ok(())
    }
}

/// 关联令牌：把两阶段上传的第二阶段绑定到第一阶段选中的Worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Worker执行结果或调度器聚合后的客户端可见结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Ready,
    Uploaded {
        file_name: String,
        file_size: u64,
    },
    Listing {
        files_list: Vec<String>,
    },
    FileStatus {
        file_name: String,
        file_exists: bool,
    },
    Deleted {
        file_name: String,
    },
    Aborted {
        file_name: String,
    },
    File {
        file_name: String,
        file_contents: Option<Vec<u8>>,
    },
    Failure {
        reason: String,
    },
}

impl JobOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        JobOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, JobOutcome::Failure { .. })
    }

    /// Listing结果中的文件数量，其他结果返回None
    pub fn file_count(&self) -> Option<usize> {
        match self {
            JobOutcome::Listing { files_list } => Some(files_list.len()),
            _ => None,
        }
    }
}

/// 作业：调度的基本单元及其结果
///
/// 同一次提交复制给多个Worker时，所有副本共享 `id` 与 `request`，
/// 但各自独立持有 `result` 和 `produced_by`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub request: JobRequest,
    #[serde(default)]
    pub token: Option<CorrelationToken>,
    #[serde(default)]
    pub result: Option<JobOutcome>,
    #[serde(default)]
    pub produced_by: Option<WorkerId>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            token: None,
            result: None,
            produced_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_token(mut self, token: CorrelationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn command(&self) -> Command {
        self.request.command()
    }

    pub fn is_processed(&self) -> bool {
        self.result.is_some()
    }

    /// 派生一个尚未处理的副本（同一提交id），用于分发给Worker
    pub fn replica(&self) -> Self {
        Self {
            id: self.id,
            request: self.request.clone(),
            token: None,
            result: None,
            produced_by: None,
            created_at: self.created_at,
        }
    }

    /// 派生一个不同命令的子作业（例如上传前的List探测），使用新的id，
    /// 避免子作业的迟到结果被误认为主作业的结果
    pub fn sub_job(&self, request: JobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            token: None,
            result: None,
            produced_by: None,
            created_at: Utc::now(),
        }
    }

    /// Worker写入结果，只允许写入一次
    pub fn stamp(&mut self, outcome: JobOutcome, worker_id: &str) -> FileStoreResult<()> {
        if self.result.is_some() || self.produced_by.is_some() {
            return Err(FileStoreError::InvalidJob(format!(
                "作业 {} 已被处理，不能重复写入结果",
                self.id
            )));
        }
        self.result = Some(outcome);
        self.produced_by = Some(worker_id.to_string());
        Ok(())
    }

    /// 生成客户端可见的结果作业（不回传上传的文件内容）
    pub fn resolved(&self, outcome: JobOutcome) -> Self {
        Self {
            id: self.id,
            request: self.request.without_contents(),
            token: self.token,
            result: Some(outcome),
            produced_by: None,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_uses_command_tag() {
        let request = JobRequest::DeleteInit {
            file_name: "a.txt".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["command"], "DELETE_INIT");
        assert_eq!(value["file_name"], "a.txt");

        let list: JobRequest = serde_json::from_str(r#"{"command":"LIST"}"#).unwrap();
        assert_eq!(list, JobRequest::List);
    }

    #[test]
    fn test_high_reliability_defaults_to_false() {
        let request: JobRequest = serde_json::from_str(
            r#"{"command":"UPLOAD_INIT","file_name":"a.bin","file_size":12}"#,
        )
        .unwrap();
        assert!(!request.high_reliability());
        assert_eq!(request.command(), Command::UploadInit);
    }

    #[test]
    fn test_validate_rejects_blank_file_name() {
        let request = JobRequest::Download {
            file_name: "   ".to_string(),
        };
        assert!(matches!(
            request.validate(),
            Err(FileStoreError::InvalidJob(_))
        ));
        assert!(JobRequest::List.validate().is_ok());
    }

    #[test]
    fn test_stamp_only_once() {
        let mut job = Job::new(JobRequest::List);
        job.stamp(JobOutcome::Listing { files_list: vec![] }, "w1")
            .unwrap();
        assert_eq!(job.produced_by.as_deref(), Some("w1"));

        let second = job.stamp(JobOutcome::failure("again"), "w2");
        assert!(second.is_err());
        assert_eq!(job.produced_by.as_deref(), Some("w1"));
    }

    #[test]
    fn test_replica_shares_id_but_not_result() {
        let mut job = Job::new(JobRequest::Download {
            file_name: "x".to_string(),
        });
        job.stamp(JobOutcome::Ready, "w1").unwrap();

        let replica = job.replica();
        assert_eq!(replica.id, job.id);
        assert_eq!(replica.request, job.request);
        assert!(replica.result.is_none());
        assert!(replica.produced_by.is_none());
    }

    #[test]
    fn test_resolved_strips_worker_identity() {
        let token = CorrelationToken::generate();
        let mut job = Job::new(JobRequest::List).with_token(token);
        job.stamp(JobOutcome::Ready, "w1").unwrap();

        let resolved = job.resolved(JobOutcome::failure("boom"));
        assert!(resolved.produced_by.is_none());
        assert_eq!(resolved.token, Some(token));
        assert!(!resolved.result.unwrap().is_success());
    }

    #[test]
    fn test_sub_job_gets_fresh_id() {
        let job = Job::new(JobRequest::Download {
            file_name: "x".to_string(),
        });
        let listing = job.sub_job(JobRequest::List);
        assert_ne!(listing.id, job.id);
        assert_eq!(listing.command(), Command::List);
    }

    #[test]
    fn test_resolved_drops_uploaded_contents() {
        let job = Job::new(JobRequest::UploadData {
            file_name: "big.bin".to_string(),
            file_contents: vec![7; 1024],
            high_reliability: true,
        });
        let resolved = job.resolved(JobOutcome::Uploaded {
            file_name: "big.bin".to_string(),
            file_size: 1024,
        });
        match resolved.request {
            JobRequest::UploadData {
                file_contents,
                high_reliability,
                ..
            } => {
                assert!(file_contents.is_empty());
                assert!(high_reliability);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = JobOutcome::FileStatus {
            file_name: "b".to_string(),
            file_exists: true,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "file_status");
        assert_eq!(value["file_exists"], true);
        assert_eq!(
            JobOutcome::Listing {
                files_list: vec!["a".to_string(), "b".to_string()]
            }
            .file_count(),
            Some(2)
        );
    }
}
