// Rust guideline compliant 2026-10-18

mod tools;

use std::sync::Arc;

use anyhow::Context;
use rmcp::{model::*, tool_handler, transport::stdio, ServerHandler, ServiceExt};

use counsel::config::get_config;
use counsel::{open_knowledge_base, Assistant, CorpusHandle};

use crate::tools::CounselMcpServer;

#[tool_handler]
impl ServerHandler for CounselMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Counsel MCP Server: academic-orientation assistant over teacher and student interview answers. Use `ask` with a stable session_id per conversation; answers taken from the corpus name their respondent. `search_corpus` inspects raw matches without touching any session.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP transport; logs go to stderr.
    counsel::utils::logging::init("info");

    let config = get_config().context("loading configuration")?;
    let base = open_knowledge_base(&config).context("loading corpus")?;
    let corpus = Arc::new(CorpusHandle::new(base));
    let assistant = Assistant::from_config(corpus, &config)
        .context("configuring remote services (is OPENAI_API_KEY set?)")?;

    let service = CounselMcpServer::new(assistant, config)
        .serve(stdio())
        .await?;
    service.waiting().await?;
    Ok(())
}
