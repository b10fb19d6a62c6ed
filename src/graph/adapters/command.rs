//! Graph producer backed by an external planning CLI.

use crate::graph::{
    domain::{ContentHash, SubGraph, TaskGraph, TaskNode, decode_graph, decode_sub_graph},
    ports::{GraphProducer, NodeExpander, ProduceRequest, ProducerError, ProducerResult},
};
use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs an external planner and decodes its JSON output.
///
/// Full graphs are requested with
/// `<program> <args..> generate --prd <path> --complexity-threshold <n>
/// --max-depth <n> --format json`; breakdowns with
/// `<program> <args..> expand --task-json <json> --depth <n>
/// --complexity-threshold <n> --format json`.
#[derive(Debug, Clone)]
pub struct CommandGraphProducer {
    program: String,
    args: Vec<String>,
}

impl CommandGraphProducer {
    /// Creates a producer invoking `program` with leading `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
        }
    }

    async fn run(&self, extra: &[String]) -> ProducerResult<String> {
        debug!(program = %self.program, ?extra, "invoking graph producer");
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ProducerError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        String::from_utf8(output.stdout)
            .map_err(|err| ProducerError::from(std::io::Error::other(err)))
    }
}

fn read_document(path: &Utf8Path) -> std::io::Result<Vec<u8>> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other("source path must include a file name"))?;
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read(file_name)
}

#[async_trait]
impl GraphProducer for CommandGraphProducer {
    async fn produce(&self, request: &ProduceRequest) -> ProducerResult<TaskGraph> {
        let contents = read_document(&request.source_path)?;
        let content_hash = ContentHash::of(&contents);
        let stdout = self
            .run(&[
                "generate".to_owned(),
                "--prd".to_owned(),
                request.source_path.to_string(),
                "--complexity-threshold".to_owned(),
                request.complexity_threshold.to_string(),
                "--max-depth".to_owned(),
                request.max_depth.to_string(),
                "--format".to_owned(),
                "json".to_owned(),
            ])
            .await?;
        let graph = decode_graph(&stdout, content_hash)?;
        info!(
            source = %request.source_path,
            nodes = graph.nodes().len(),
            "graph produced"
        );
        Ok(graph)
    }
}

#[async_trait]
impl NodeExpander for CommandGraphProducer {
    async fn breakdown(
        &self,
        node: &TaskNode,
        depth_limit: u32,
        complexity_threshold: u32,
    ) -> ProducerResult<SubGraph> {
        let task_json = serde_json::to_string(node)
            .map_err(|err| ProducerError::from(std::io::Error::other(err)))?;
        let stdout = self
            .run(&[
                "expand".to_owned(),
                "--task-json".to_owned(),
                task_json,
                "--depth".to_owned(),
                depth_limit.to_string(),
                "--complexity-threshold".to_owned(),
                complexity_threshold.to_string(),
                "--format".to_owned(),
                "json".to_owned(),
            ])
            .await?;
        Ok(decode_sub_graph(&stdout, node.id())?)
    }
}
