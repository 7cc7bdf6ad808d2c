pub mod body;
pub mod dsl;
pub mod tests;

use crate::contract::module::{split_top_level, Constant, Contract, Function, Import, Module, TypeDef};
use crate::transpiler::builtins::BuiltinRegistry;
use crate::transpiler::errors::TranspileError;
use crate::transpiler::types::TypeMapper;
use crate::transpiler::validator::{handler_signature, snake_case};
use body::convert_body;
use dsl::indent;
use tracing::debug;

/// Opening token of a pre-built validator block.
pub const VALIDATOR_TOKEN: &str = "validator ";

/// Renders a transformed module as Aiken source.
///
/// Import lines are assembled last so that every builtin referenced while
/// rendering bodies is already recorded in the registry.
pub struct AikenCodeGenerator<'r> {
    registry: &'r mut BuiltinRegistry,
}

impl<'r> AikenCodeGenerator<'r> {
    pub fn new(registry: &'r mut BuiltinRegistry) -> Self {
        Self { registry }
    }

    pub fn generate(&mut self, module: &Module) -> Result<String, TranspileError> {
        let mut sections = Vec::new();

        for type_def in &module.types {
            sections.push(self.generate_type(&module.name, type_def)?);
        }
        for constant in &module.constants {
            sections.push(self.generate_constant(constant));
        }
        for function in &module.functions {
            sections.push(self.generate_function(&module.name, function)?);
        }
        for test in &module.tests {
            sections.push(self.generate_test(test));
        }

        let mut code = String::new();
        for line in &module.docs {
            if line.is_empty() {
                code.push_str("////\n");
            } else {
                code.push_str(&format!("//// {}\n", line));
            }
        }
        if !module.docs.is_empty() {
            code.push('\n');
        }

        let imports = self.generate_imports(&module.imports);
        if !imports.is_empty() {
            code.push_str(&imports.join("\n"));
            code.push_str("\n\n");
        }

        code.push_str(&sections.join("\n\n"));
        code.push('\n');

        debug!(
            module = %module.name,
            sections = sections.len(),
            imports = imports.len(),
            "generated module"
        );
        Ok(code)
    }

    /// Datum records plus one validator block holding a handler per purpose.
    pub fn generate_contract(&mut self, contract: &Contract) -> Result<String, TranspileError> {
        if contract.validators.is_empty() {
            return Err(TranspileError::generation(
                &contract.name,
                &contract.name,
                "contract has no validators",
            ));
        }

        let mut sections = Vec::new();
        for datum in &contract.datums {
            let mut code = format!("pub type {} {{\n", datum.name);
            for field in &datum.fields {
                code.push_str(&format!("  {}: {},\n", field.name, field.ty));
            }
            code.push('}');
            sections.push(code);
        }

        let mut block = format!("{}{} {{\n", VALIDATOR_TOKEN, snake_case(&contract.name));
        let handlers: Vec<String> = contract
            .validators
            .iter()
            .map(|validator| {
                let body = if validator.body.trim().is_empty() {
                    "True".to_string()
                } else {
                    validator.body.clone()
                };
                format!(
                    "  {} {{\n{}\n  }}",
                    handler_signature(&validator.purpose, &validator.parameters),
                    indent(&body, 4)
                )
            })
            .collect();
        block.push_str(&handlers.join("\n\n"));
        block.push_str("\n}");
        sections.push(block);

        let imports = self.generate_imports(&[]);
        let mut code = String::new();
        if !imports.is_empty() {
            code.push_str(&imports.join("\n"));
            code.push_str("\n\n");
        }
        code.push_str(&sections.join("\n\n"));
        code.push('\n');
        Ok(code)
    }

    fn generate_imports(&self, explicit: &[Import]) -> Vec<String> {
        let mut lines = Vec::new();

        for group in self.registry.used_import_groups() {
            if explicit.iter().any(|import| import.module == group) {
                continue;
            }
            let types = self.registry.used_types_in(group);
            if types.is_empty() {
                lines.push(format!("use {}", group));
            } else {
                lines.push(format!("use {}.{{{}}}", group, types.join(", ")));
            }
        }

        for import in explicit {
            match (&import.alias, &import.exposing) {
                (Some(alias), _) => lines.push(format!("use {} as {}", import.module, alias)),
                (None, Some(names)) => {
                    // names the type mapper rewrites have no counterpart in the target module
                    let kept: Vec<&str> = names
                        .iter()
                        .map(String::as_str)
                        .filter(|name| TypeMapper::map_name(name) == *name)
                        .collect();
                    if !kept.is_empty() {
                        lines.push(format!("use {}.{{{}}}", import.module, kept.join(", ")));
                    }
                }
                (None, None) => lines.push(format!("use {}", import.module)),
            }
        }

        lines
    }

    fn generate_type(&self, module: &str, type_def: &TypeDef) -> Result<String, TranspileError> {
        let definition = type_def.definition.trim();
        if definition.is_empty() {
            return Err(TranspileError::generation(
                module,
                &type_def.name,
                "type has an empty definition",
            ));
        }

        let mut code = doc_comment(&type_def.docs);
        let visibility = if type_def.is_opaque {
            "pub opaque type"
        } else if type_def.is_public {
            "pub type"
        } else {
            "type"
        };
        let generics = if type_def.type_params.is_empty() {
            String::new()
        } else {
            format!("<{}>", type_def.type_params.join(", "))
        };
        let head = format!("{} {}{}", visibility, type_def.name, generics);

        let variants: Vec<String> = split_top_level(definition, &['|'])
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        if let Some(fields) = type_def.record_fields() {
            code.push_str(&format!("{} {{\n", head));
            for (name, ty) in fields {
                code.push_str(&format!("  {}: {},\n", name, ty));
            }
            code.push('}');
        } else if variants.len() < 2 {
            code.push_str(&format!("{} = {}", head, definition));
        } else if variants.iter().any(|v| v.starts_with('{')) {
            return Err(TranspileError::generation(
                module,
                &type_def.name,
                "union of object types has no constructor names",
            ));
        } else {
            code.push_str(&format!("{} {{\n", head));
            for variant in &variants {
                code.push_str(&format!("  {}\n", variant_name(variant)));
            }
            code.push('}');
        }

        Ok(code)
    }

    fn generate_constant(&self, constant: &Constant) -> String {
        let mut code = doc_comment(&constant.docs);
        if constant.is_public {
            code.push_str("pub ");
        }
        match &constant.ty {
            Some(ty) => code.push_str(&format!("const {}: {} = {}", constant.name, ty, constant.value)),
            None => code.push_str(&format!("const {} = {}", constant.name, constant.value)),
        }
        code
    }

    fn generate_function(
        &mut self,
        module: &str,
        function: &Function,
    ) -> Result<String, TranspileError> {
        let mut code = doc_comment(&function.docs);

        if function.body.trim_start().starts_with(VALIDATOR_TOKEN) {
            code.push_str(function.body.trim());
            return Ok(code);
        }
        if function.purpose.is_some() {
            return Err(TranspileError::generation(
                module,
                &function.name,
                "validator reached generation without a validator block",
            ));
        }

        if function.is_public {
            code.push_str("pub ");
        }
        code.push_str("fn ");
        code.push_str(&function.name);
        if !function.type_params.is_empty() {
            code.push_str(&format!("<{}>", function.type_params.join(", ")));
        }
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, TypeMapper::map_type_str(&p.ty)))
            .collect();
        code.push_str(&format!("({})", params.join(", ")));
        if !function.return_type.is_empty() {
            code.push_str(&format!(" -> {}", TypeMapper::map_type_str(&function.return_type)));
        }

        let body = function_body(function, self.registry);
        code.push_str(&format!(" {{\n{}\n}}", indent(&body, 2)));
        Ok(code)
    }

    fn generate_test(&mut self, test: &Function) -> String {
        let mut code = doc_comment(&test.docs);
        let body = function_body(test, self.registry);
        code.push_str(&format!("test {}() {{\n{}\n}}", test.name, indent(&body, 2)));
        code
    }
}

/// Target body text for a function, without enclosing braces.
///
/// Expect assertions come first. The rest is, in order of preference: the
/// function's `when` blocks, a conditional pipeline, a single pipeline, the
/// structurally converted body, and finally the heuristic text conversion.
pub(crate) fn function_body(function: &Function, registry: &mut BuiltinRegistry) -> String {
    function_body_or(function, registry, "Void")
}

/// Like [`function_body`], with `empty` standing in for a body that renders to nothing.
pub(crate) fn function_body_or(
    function: &Function,
    registry: &mut BuiltinRegistry,
    empty: &str,
) -> String {
    let mut lines: Vec<String> = function
        .expect_expressions
        .iter()
        .map(dsl::expect_line)
        .collect();

    let body = if !function.when_expressions.is_empty() {
        function
            .when_expressions
            .iter()
            .map(|when| dsl::when_block(when, registry))
            .collect::<Vec<_>>()
            .join("\n")
    } else if let Some(code) =
        dsl::conditional_pipeline(&function.body, &function.pipe_expressions, registry)
    {
        code
    } else if function.pipe_expressions.len() == 1 {
        dsl::pipeline(&function.pipe_expressions[0], registry)
    } else if let Some(converted) = &function.converted_body {
        converted.clone()
    } else {
        convert_body(&function.body, registry)
    };

    if !body.trim().is_empty() {
        lines.push(body);
    }
    if lines.is_empty() {
        return empty.to_string();
    }
    lines.join("\n")
}

fn doc_comment(docs: &[String]) -> String {
    docs.iter()
        .map(|line| {
            if line.is_empty() {
                "///\n".to_string()
            } else {
                format!("/// {}\n", line)
            }
        })
        .collect()
}

/// `"claim"` becomes `Claim`.
fn variant_name(variant: &str) -> String {
    let unquoted = variant.trim_matches(|c| c == '"' || c == '\'' || c == '`');
    let mut chars = unquoted.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
