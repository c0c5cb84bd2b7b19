// ABOUTME: Test utilities for partshelf-converter, including a scripted converter runtime.
// ABOUTME: Used in tests to simulate easyeda2kicad output and exit codes without the real tool.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use partshelf_core::{Identifier, LogBroadcaster};
use partshelf_store::ArtifactPaths;

use crate::runtime::{ConverterError, ConverterExit, ConverterRuntime, forward_output_line};

/// What the scripted converter does for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub exit_code: i32,
    pub symbol: bool,
    /// Footprint names, written as `<name>.kicad_mod`.
    pub footprints: Vec<String>,
    /// Model file names including extension.
    pub models: Vec<String>,
    /// Console lines printed before exiting.
    pub output: Vec<String>,
}

impl Script {
    /// Exit 0 with a symbol, one footprint, and one 3D model.
    pub fn complete() -> Self {
        Self {
            exit_code: 0,
            symbol: true,
            footprints: vec!["R0603".to_owned()],
            models: vec!["R0603.step".to_owned()],
            output: vec![
                "Fetching part data".to_owned(),
                "Created symbol, footprint and 3D model".to_owned(),
            ],
        }
    }

    /// Exit 0 without writing anything.
    pub fn empty() -> Self {
        Self {
            exit_code: 0,
            symbol: false,
            footprints: Vec::new(),
            models: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Exit with `code` after printing an error line.
    pub fn failing(code: i32) -> Self {
        Self {
            exit_code: code,
            output: vec!["Failed to fetch data from EasyEDA API".to_owned()],
            ..Self::empty()
        }
    }

    pub fn with_symbol(mut self) -> Self {
        self.symbol = true;
        self
    }

    pub fn with_footprints(mut self, names: &[&str]) -> Self {
        self.footprints = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }

    pub fn with_models(mut self, names: &[&str]) -> Self {
        self.models = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }
}

/// A converter that writes artifacts according to a per-identifier script.
///
/// Identifiers without a script of their own use the default script. Every
/// call is recorded so tests can assert which identifiers were converted.
#[derive(Debug)]
pub struct ScriptedConverter {
    default: Script,
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedConverter {
    fn default() -> Self {
        Self::new(Script::complete())
    }
}

impl ScriptedConverter {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_owned(), script);
        self
    }

    /// Identifiers converted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn script_for(&self, id: &Identifier) -> &Script {
        self.scripts.get(id.as_str()).unwrap_or(&self.default)
    }
}

#[async_trait]
impl ConverterRuntime for ScriptedConverter {
    async fn convert(
        &self,
        id: &Identifier,
        output_prefix: &Path,
        log: &LogBroadcaster,
    ) -> Result<ConverterExit, ConverterError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(id.to_string());

        let script = self.script_for(id);
        for line in &script.output {
            forward_output_line(id, line, log);
        }
        write_artifacts(output_prefix, script)?;
        Ok(ConverterExit::with_code(script.exit_code))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn write_artifacts(prefix: &Path, script: &Script) -> std::io::Result<()> {
    let paths = ArtifactPaths::from_prefix(prefix);
    if script.symbol {
        fs::write(&paths.symbol, "(kicad_symbol_lib (version 20211014))\n")?;
    }
    if !script.footprints.is_empty() {
        fs::create_dir_all(&paths.footprint_dir)?;
        for name in &script.footprints {
            let body = format!("(footprint \"{name}\")\n");
            fs::write(paths.footprint_dir.join(format!("{name}.kicad_mod")), body)?;
        }
    }
    if !script.models.is_empty() {
        fs::create_dir_all(&paths.model_dir)?;
        for name in &script.models {
            fs::write(paths.model_dir.join(name), "ISO-10303-21;\n")?;
        }
    }
    Ok(())
}
