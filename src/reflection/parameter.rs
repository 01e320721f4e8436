use crate::core::value::Val;
use crate::parser::ast::printer::print_expr;
use crate::parser::ast::{Expr, Param};
use crate::reflection::context::EvaluationContext;
use crate::reflection::error::{ReflectionError, Result};
use crate::reflection::resolver::{ExpressionValue, evaluate_parameter_default};
use crate::reflection::types::ReflectionType;
use std::fmt;

/// A function or method parameter together with the context its default
/// value is evaluated in.
pub struct ReflectionParameter {
    param: Param,
    position: usize,
    function_name: String,
    optional: bool,
    context: EvaluationContext,
}

impl fmt::Debug for ReflectionParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionParameter")
            .field("name", &self.param.name)
            .field("position", &self.position)
            .field("function", &self.function_name)
            .finish()
    }
}

impl ReflectionParameter {
    pub(crate) fn collect(
        params: &[Param],
        function_name: &str,
        context: &EvaluationContext,
    ) -> Vec<Self> {
        let required = Self::required_count(params);
        params
            .iter()
            .enumerate()
            .map(|(position, param)| Self {
                param: param.clone(),
                position,
                function_name: function_name.to_string(),
                optional: position >= required,
                context: context.clone(),
            })
            .collect()
    }

    /// Parameters before the trailing run of defaulted or variadic ones.
    pub(crate) fn required_count(params: &[Param]) -> usize {
        params
            .iter()
            .rposition(|param| param.default.is_none() && !param.variadic)
            .map_or(0, |last| last + 1)
    }

    /// Name without the `$`.
    pub fn name(&self) -> &str {
        &self.param.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// `Class::method` or the function name.
    pub fn declaring_function(&self) -> &str {
        &self.function_name
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_variadic(&self) -> bool {
        self.param.variadic
    }

    pub fn is_passed_by_reference(&self) -> bool {
        self.param.by_ref
    }

    pub fn can_be_passed_by_value(&self) -> bool {
        !self.param.by_ref
    }

    /// Constructor promotion (`public int $x`).
    pub fn is_promoted(&self) -> bool {
        self.param.modifiers.has_visibility()
    }

    fn defaults_to_null(&self) -> bool {
        matches!(
            self.param.default.as_deref(),
            Some(Expr::ConstFetch { name, .. }) if name.text.eq_ignore_ascii_case("null")
        )
    }

    pub fn has_type(&self) -> bool {
        self.param.ty.is_some()
    }

    pub fn type_(&self) -> Option<ReflectionType> {
        let ty = self.param.ty.as_ref()?;
        Some(ReflectionType::from_ast(ty, self.defaults_to_null()))
    }

    pub fn allows_null(&self) -> bool {
        self.type_().is_none_or(|ty| ty.allows_null())
    }

    pub fn has_default_value(&self) -> bool {
        self.param.default.is_some()
    }

    /// Default value as written, rendered back to PHP.
    pub fn default_value_text(&self) -> Option<String> {
        self.param.default.as_deref().map(print_expr)
    }

    fn evaluate_default(&self) -> Result<ExpressionValue> {
        let Some(default) = &self.param.default else {
            return Err(ReflectionError::resolution(
                format!("${}", self.param.name),
                format!(
                    "Parameter #{} of {} has no default value",
                    self.position, self.function_name
                ),
            ));
        };
        evaluate_parameter_default(default, &self.context)
    }

    pub fn default_value(&self) -> Result<Val> {
        Ok(self.evaluate_default()?.value)
    }

    pub fn is_default_value_constant(&self) -> Result<bool> {
        Ok(self.evaluate_default()?.is_constant)
    }

    pub fn default_value_constant_name(&self) -> Result<Option<String>> {
        Ok(self.evaluate_default()?.constant_name)
    }

    pub fn line(&self) -> usize {
        self.param.start_line
    }
}
