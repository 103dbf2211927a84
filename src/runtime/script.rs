//! Rhai script invoker
//!
//! A function body is Rhai source. Two shapes are accepted:
//!
//! ```rhai
//! fn calculateTotal(price, quantity, tax) {
//!     price * quantity + tax
//! }
//! ```
//!
//! in which case the function named like the definition is called with the
//! arguments, or a bare script that reads the arguments by name:
//!
//! ```rhai
//! price * quantity + tax
//! ```
//!
//! Numbers are passed to scripts as floats.

use crate::core::{function::FunctionDefinition, types::Value};
use crate::runtime::{FunctionInvoker, InvocationFault};
use async_trait::async_trait;
use rhai::{Array, Dynamic, Engine, Scope, AST};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;

/// Safety limits applied to every script
#[derive(Debug, Clone)]
pub struct ScriptLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 100_000,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

struct CachedBody {
    source: String,
    ast: AST,
}

/// Executes function bodies written in Rhai
pub struct ScriptInvoker {
    engine: Engine,
    /// Latest compiled body per function name, with the source it came from
    cache: RwLock<HashMap<String, CachedBody>>,
}

impl ScriptInvoker {
    pub fn new() -> Self {
        Self::with_limits(ScriptLimits::default())
    }

    pub fn with_limits(limits: ScriptLimits) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        Self {
            engine,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Compile a body, reusing the function's earlier compilation while its
    /// source is unchanged
    pub fn compile(&self, function: &FunctionDefinition) -> Result<AST, InvocationFault> {
        let raised = |message: String| InvocationFault::Raised {
            function: function.name.clone(),
            message,
        };

        if let Some(cached) = self
            .cache
            .read()
            .map_err(|e| raised(format!("script cache unavailable: {}", e)))?
            .get(&function.name)
        {
            if cached.source == function.body {
                return Ok(cached.ast.clone());
            }
        }

        debug!("Compiling body of {}", function.name);
        let ast = self
            .engine
            .compile(&function.body)
            .map_err(|e| raised(format!("compilation error: {}", e)))?;

        self.cache
            .write()
            .map_err(|e| raised(format!("script cache unavailable: {}", e)))?
            .insert(
                function.name.clone(),
                CachedBody {
                    source: function.body.clone(),
                    ast: ast.clone(),
                },
            );

        Ok(ast)
    }

    /// Number of functions with a compiled body
    pub fn cached(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    fn run(&self, function: &FunctionDefinition, args: &[Value]) -> Result<Option<Value>, InvocationFault> {
        let ast = self.compile(function)?;
        let raised = |message: String| InvocationFault::Raised {
            function: function.name.clone(),
            message,
        };

        let defines_entry_point = ast
            .iter_functions()
            .any(|f| f.name == function.name && f.params.len() == args.len());

        let mut scope = Scope::new();
        let result = if defines_entry_point {
            let call_args: Vec<Dynamic> = args.iter().map(to_dynamic).collect();
            self.engine
                .call_fn::<Dynamic>(&mut scope, &ast, &function.name, call_args)
        } else {
            for (arg, value) in function.arguments.iter().zip(args) {
                scope.push_dynamic(arg.name.as_str(), to_dynamic(value));
            }
            self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        }
        .map_err(|e| raised(e.to_string()))?;

        if result.is_unit() {
            return Ok(None);
        }

        from_dynamic(result)
            .map(Some)
            .map_err(|detail| InvocationFault::UnsupportedValue {
                function: function.name.clone(),
                detail,
            })
    }
}

impl Default for ScriptInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FunctionInvoker for ScriptInvoker {
    async fn invoke(
        &self,
        function: &FunctionDefinition,
        args: &[Value],
    ) -> Result<Option<Value>, InvocationFault> {
        self.run(function, args)
    }
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Number(n) => Dynamic::from(*n),
        Value::List(items) => {
            let array: Array = items.iter().map(to_dynamic).collect();
            Dynamic::from(array)
        }
        Value::Map(entries) => {
            let mut map = rhai::Map::new();
            for (key, value) in entries {
                map.insert(key.as_str().into(), to_dynamic(value));
            }
            Dynamic::from(map)
        }
    }
}

fn from_dynamic(value: Dynamic) -> Result<Value, String> {
    let type_name = value.type_name();

    if value.is_string() {
        return value.into_string().map(Value::String).map_err(str::to_string);
    }
    if value.is_char() {
        return value.as_char().map(|c| Value::String(c.to_string())).map_err(str::to_string);
    }
    if value.is_float() {
        let number = value.as_float().map_err(str::to_string)?;
        if !number.is_finite() {
            return Err(format!("non-finite number {}", number));
        }
        return Ok(Value::Number(number));
    }
    if value.is_int() {
        return value.as_int().map(|i| Value::Number(i as f64)).map_err(str::to_string);
    }
    if value.is_array() {
        let items = value.into_array().map_err(str::to_string)?;
        return items
            .into_iter()
            .map(from_dynamic)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List);
    }
    if value.is_map() {
        let map = value
            .try_cast::<rhai::Map>()
            .ok_or_else(|| "map could not be read".to_string())?;
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            entries.insert(key.to_string(), from_dynamic(value)?);
        }
        return Ok(Value::Map(entries));
    }

    Err(format!("values of type {} have no equivalent", type_name))
}
