//! Rhai scripting engine integration
//!
//! Script actions run in a sandboxed engine with the task's name,
//! arguments and prerequisites in scope, plus a small file and path
//! library for build work.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST};

use crate::error::{JakeError, Result};
use crate::fileset::FileSet;
use crate::pathmap;
use crate::task::{action, Action};

/// What a script can see about the task running it
#[derive(Debug, Clone, Default)]
pub struct ScriptContext {
    pub name: String,
    pub args: HashMap<String, String>,
    pub prerequisites: Vec<String>,
}

/// Script execution engine
#[derive(Debug, Clone, Default)]
pub struct ScriptEngine {
    _marker: std::marker::PhantomData<()>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configured engine instance
    fn create_engine() -> Engine {
        let mut engine = Engine::new();

        // Configure sandboxing
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);
        engine.set_max_modules(10);
        engine.set_max_string_size(1024 * 1024);

        Self::register_stdlib(&mut engine);

        engine
    }

    /// Compile a script for repeated execution
    pub fn compile(&self, script: &str) -> std::result::Result<AST, Box<EvalAltResult>> {
        let engine = Self::create_engine();
        engine.compile(script).map_err(|e| e.into())
    }

    /// Execute a script, returning everything it printed
    pub fn execute(&self, script: &str, ctx: &ScriptContext) -> std::result::Result<String, Box<EvalAltResult>> {
        let ast = self.compile(script)?;
        self.execute_ast(&ast, ctx)
    }

    /// Execute a pre-compiled script
    pub fn execute_ast(&self, ast: &AST, ctx: &ScriptContext) -> std::result::Result<String, Box<EvalAltResult>> {
        let mut scope = Scope::new();

        let args: rhai::Map = ctx
            .args
            .iter()
            .map(|(k, v)| (k.clone().into(), Dynamic::from(v.clone())))
            .collect();
        let prerequisites: rhai::Array = ctx
            .prerequisites
            .iter()
            .map(|p| Dynamic::from(p.clone()))
            .collect();

        scope.push_constant("name", ctx.name.clone());
        scope.push_constant("args", args);
        scope.push_constant("prerequisites", prerequisites);

        // Capture output
        let output = Arc::new(Mutex::new(String::new()));
        let output_clone = Arc::clone(&output);

        let mut engine = Self::create_engine();
        engine.on_print(move |s| {
            if let Ok(mut out) = output_clone.lock() {
                out.push_str(s);
                out.push('\n');
            }
        });

        engine.run_ast_with_scope(&mut scope, ast)?;

        let result = output.lock().map(|out| out.clone()).unwrap_or_default();
        Ok(result)
    }

    /// Register standard library functions
    fn register_stdlib(engine: &mut Engine) {
        // File operations
        engine.register_fn("read_file", |path: &str| -> std::result::Result<String, Box<EvalAltResult>> {
            std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read file '{}': {}", path, e).into())
        });

        engine.register_fn("write_file", |path: &str, content: &str| -> std::result::Result<(), Box<EvalAltResult>> {
            std::fs::write(path, content)
                .map_err(|e| format!("Failed to write file '{}': {}", path, e).into())
        });

        engine.register_fn("touch", |path: &str| -> std::result::Result<(), Box<EvalAltResult>> {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|file| file.set_modified(std::time::SystemTime::now()))
                .map_err(|e| format!("Failed to touch '{}': {}", path, e).into())
        });

        engine.register_fn("file_exists", |path: &str| -> bool {
            std::path::Path::new(path).exists()
        });

        engine.register_fn("is_dir", |path: &str| -> bool {
            std::path::Path::new(path).is_dir()
        });

        // Directory operations
        engine.register_fn("mkdir", |path: &str| -> std::result::Result<(), Box<EvalAltResult>> {
            std::fs::create_dir_all(path)
                .map_err(|e| format!("Failed to create directory '{}': {}", path, e).into())
        });

        engine.register_fn("rm", |path: &str| -> std::result::Result<(), Box<EvalAltResult>> {
            let p = std::path::Path::new(path);
            let removed = if p.is_dir() {
                std::fs::remove_dir_all(p)
            } else {
                std::fs::remove_file(p)
            };
            removed.map_err(|e| format!("Failed to remove '{}': {}", path, e).into())
        });

        // Path operations
        engine.register_fn("ext", |path: &str, new_ext: &str| -> String {
            pathmap::ext(path, new_ext)
        });

        engine.register_fn("pathmap", |path: &str, spec: &str| -> std::result::Result<String, Box<EvalAltResult>> {
            pathmap::pathmap(path, spec).map_err(|e| e.to_string().into())
        });

        engine.register_fn("basename", |path: &str| -> String {
            pathmap::basename(path).to_string()
        });

        engine.register_fn("dirname", |path: &str| -> String {
            pathmap::dirname(path).to_string()
        });

        // Shell command execution
        engine.register_fn("exec", |cmd: &str| -> std::result::Result<String, Box<EvalAltResult>> {
            let output = std::process::Command::new("sh").args(["-c", cmd]).output();

            match output {
                Ok(o) if o.status.success() => Ok(String::from_utf8_lossy(&o.stdout).to_string()),
                Ok(o) => {
                    let stderr = String::from_utf8_lossy(&o.stderr);
                    Err(format!("Command failed: {}", stderr).into())
                }
                Err(e) => Err(format!("Failed to execute command: {}", e).into()),
            }
        });

        // Environment
        engine.register_fn("get_env", |key: &str| -> String {
            std::env::var(key).unwrap_or_default()
        });

        engine.register_fn("set_env", |key: &str, value: &str| {
            std::env::set_var(key, value);
        });

        // Globs go through FileSet so default exclusions apply
        engine.register_fn("glob", |pattern: &str| -> std::result::Result<rhai::Array, Box<EvalAltResult>> {
            let paths = FileSet::from_patterns([pattern])
                .to_vec()
                .map_err(|e| e.to_string())?;
            Ok(paths.into_iter().map(Dynamic::from).collect())
        });
    }
}

/// Compile `script` into an action for `task`. Syntax errors surface here,
/// at load time.
pub fn script_action(task: &str, script: &str) -> Result<Action> {
    let engine = ScriptEngine::new();
    let ast = engine.compile(script).map_err(|source| JakeError::ScriptFailed {
        task: task.to_string(),
        source,
    })?;
    let ast = Rc::new(ast);

    Ok(action(move |task, args| {
        let ctx = ScriptContext {
            name: task.name().to_string(),
            args: args.to_map(),
            prerequisites: task.prerequisites().to_vec(),
        };

        let output = engine
            .execute_ast(&ast, &ctx)
            .map_err(|source| JakeError::ScriptFailed {
                task: task.name().to_string(),
                source,
            })?;
        print!("{}", output);
        Ok(())
    }))
}
