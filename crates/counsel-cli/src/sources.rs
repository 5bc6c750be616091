//! Corpus selection shared by the subcommands: a persisted index, explicit
//! `name=path` CSV sources, or whatever the configuration names.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use counsel::config::load_config;
use counsel::{
    build_from_sources, load_knowledge_json, open_knowledge_base, AppConfig, CorpusSource,
    KnowledgeBase,
};

/// Where to read the corpus from.
#[derive(Args, Debug, Clone, Default)]
pub struct CorpusArgs {
    /// Persisted index written by `counsel index`.
    #[arg(short = 'i', long, value_name = "PATH", conflicts_with = "sources")]
    pub index: Option<PathBuf>,

    /// CSV source as `name=path` (repeatable, loaded in order).
    #[arg(long = "source", value_name = "NAME=PATH", value_parser = parse_source_spec)]
    pub sources: Vec<CorpusSource>,

    /// Configuration file (defaults to ./counsel.toml when present).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Parse `name=path`. A bare path uses its file stem as the name.
pub fn parse_source_spec(spec: &str) -> Result<CorpusSource> {
    let spec = spec.trim();
    if spec.is_empty() {
        bail!("empty corpus source");
    }
    match spec.split_once('=') {
        Some((name, path)) => {
            let (name, path) = (name.trim(), path.trim());
            if name.is_empty() || path.is_empty() {
                bail!("corpus source {spec:?} must be NAME=PATH");
            }
            Ok(CorpusSource::new(name, path))
        }
        None => {
            let path = PathBuf::from(spec);
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| spec.to_string());
            Ok(CorpusSource::new(name, path))
        }
    }
}

impl CorpusArgs {
    pub fn load_config(&self) -> Result<AppConfig> {
        load_config(self.config.as_deref()).context("loading configuration")
    }

    /// Resolve the knowledge base: `--index`, then `--source`, then config.
    pub fn load_knowledge_base(&self, config: &AppConfig) -> Result<KnowledgeBase> {
        if let Some(path) = &self.index {
            return load_knowledge_json(path)
                .with_context(|| format!("loading index from {}", path.display()));
        }
        if !self.sources.is_empty() {
            return build_from_sources(&self.sources).context("building index from --source files");
        }
        open_knowledge_base(config).context("building index from configured corpus")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_named_and_bare_sources() {
        let named = parse_source_spec("maestros=datos/Entrevistas_maestros.csv").unwrap();
        assert_eq!(named.name, "maestros");
        assert_eq!(named.path, Path::new("datos/Entrevistas_maestros.csv"));

        let bare = parse_source_spec("Entrevistas_estudiantes.csv").unwrap();
        assert_eq!(bare.name, "Entrevistas_estudiantes");
    }

    #[test]
    fn rejects_incomplete_specs() {
        assert!(parse_source_spec("=x.csv").is_err());
        assert!(parse_source_spec("maestros=").is_err());
        assert!(parse_source_spec("  ").is_err());
    }
}
