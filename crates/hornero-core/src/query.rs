//! Backend-neutral statements produced by the scoped query builder.
//!
//! A [`Statement`] carries the caller's predicates and, separately, the tenant
//! constraint added by the builder. Backends must apply both in the same
//! operation; [`Statement::to_sql`] renders them into one parameterized
//! statement.

use std::cmp::Ordering;

use serde::Serialize;

use crate::tenant::TenantId;

/// A literal bound into a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Converts a JSON scalar. Arrays and objects are not bindable.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// SQL-style comparison against a stored JSON value. `None` means the
    /// values are not comparable.
    pub fn compare_json(&self, stored: &serde_json::Value) -> Option<Ordering> {
        match (self, stored) {
            (Value::Null, serde_json::Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), serde_json::Value::Bool(b)) => Some(b.cmp(a)),
            (Value::Int(a), serde_json::Value::Number(n)) => match n.as_i64() {
                Some(b) => Some(b.cmp(a)),
                None => n.as_f64()?.partial_cmp(&(*a as f64)),
            },
            (Value::Float(a), serde_json::Value::Number(n)) => n.as_f64()?.partial_cmp(a),
            (Value::Text(a), serde_json::Value::String(b)) => Some(b.as_str().cmp(a.as_str())),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<TenantId> for Value {
    fn from(value: TenantId) -> Self {
        Value::Int(value.get())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// `ordering` is stored-vs-bound.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

impl Predicate {
    /// Evaluates the predicate against a stored row. Missing columns behave
    /// like SQL `NULL`: they only satisfy `= NULL`.
    pub fn matches(&self, row: &serde_json::Map<String, serde_json::Value>) -> bool {
        let stored = row.get(&self.column).unwrap_or(&serde_json::Value::Null);
        self.value
            .compare_json(stored)
            .is_some_and(|ordering| self.op.accepts(ordering))
    }
}

/// Caller-supplied predicates, combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Eq, value)
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Ne, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Gt, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Op::Lt, value)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn into_predicates(self) -> Vec<Predicate> {
        self.predicates
    }
}

/// Column values for inserts and updates, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments {
    values: Vec<(String, Value)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later assignments to the same column replace earlier ones.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let index = self.values.iter().position(|(c, _)| c == column)?;
        Some(self.values.remove(index).1)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Builds assignments from a JSON object, rejecting nested values.
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, String> {
        object.iter().try_fold(Self::new(), |acc, (column, value)| {
            Value::from_json(value)
                .map(|value| acc.set(column.clone(), value))
                .ok_or_else(|| column.clone())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
        }
    }
}

/// Tenant constraint attached by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub column: &'static str,
    pub tenant_id: TenantId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    entity: &'static str,
    table: &'static str,
    predicates: Vec<Predicate>,
    assignments: Assignments,
    scope: Option<TenantScope>,
}

impl Statement {
    pub(crate) fn new(
        kind: StatementKind,
        entity: &'static str,
        table: &'static str,
        predicates: Vec<Predicate>,
        assignments: Assignments,
        scope: Option<TenantScope>,
    ) -> Self {
        Self {
            kind,
            entity,
            table,
            predicates,
            assignments,
            scope,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    pub fn scope(&self) -> Option<TenantScope> {
        self.scope
    }

    /// Whether a stored row satisfies both caller predicates and the tenant
    /// constraint.
    pub fn matches(&self, row: &serde_json::Map<String, serde_json::Value>) -> bool {
        let in_scope = self.scope.map_or(true, |scope| {
            row.get(scope.column)
                .and_then(serde_json::Value::as_i64)
                .is_some_and(|owner| owner == scope.tenant_id.get())
        });
        in_scope && self.predicates.iter().all(|p| p.matches(row))
    }

    /// Renders a PostgreSQL statement with `$n` placeholders.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = match self.kind {
            StatementKind::Select => format!(
                "SELECT * FROM {}{} ORDER BY id ASC",
                self.table,
                self.where_clause(&mut params)
            ),
            StatementKind::Insert => {
                let mut columns = Vec::new();
                let mut placeholders = Vec::new();
                for (column, value) in self.assignments.iter() {
                    params.push(value.clone());
                    columns.push(column.to_string());
                    placeholders.push(format!("${}", params.len()));
                }
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
                    self.table,
                    columns.join(", "),
                    placeholders.join(", ")
                )
            }
            StatementKind::Update => {
                let mut sets = Vec::new();
                for (column, value) in self.assignments.iter() {
                    params.push(value.clone());
                    sets.push(format!("{column} = ${}", params.len()));
                }
                let where_clause = self.where_clause(&mut params);
                format!("UPDATE {} SET {}{}", self.table, sets.join(", "), where_clause)
            }
            StatementKind::Delete => {
                format!("DELETE FROM {}{}", self.table, self.where_clause(&mut params))
            }
        };
        (sql, params)
    }

    fn where_clause(&self, params: &mut Vec<Value>) -> String {
        let mut conditions = Vec::new();
        for predicate in &self.predicates {
            if predicate.value == Value::Null {
                let test = if predicate.op == Op::Ne { "IS NOT NULL" } else { "IS NULL" };
                conditions.push(format!("{} {test}", predicate.column));
                continue;
            }
            params.push(predicate.value.clone());
            conditions.push(format!(
                "{} {} ${}",
                predicate.column,
                predicate.op.as_sql(),
                params.len()
            ));
        }
        if let Some(scope) = self.scope {
            params.push(Value::from(scope.tenant_id));
            conditions.push(format!("{} = ${}", scope.column, params.len()));
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

/// `[a-z_][a-z0-9_]*`, the only column names the builder will render.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    fn scoped_select() -> Statement {
        Statement::new(
            StatementKind::Select,
            "Supplier",
            "proveedores",
            Filter::new().eq("activo", true).into_predicates(),
            Assignments::new(),
            Some(TenantScope {
                column: "panaderia_id",
                tenant_id: TenantId::new(3),
            }),
        )
    }

    #[test]
    fn select_renders_tenant_predicate_last() {
        let (sql, params) = scoped_select().to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM proveedores WHERE activo = $1 AND panaderia_id = $2 ORDER BY id ASC"
        );
        assert_eq!(params, vec![Value::Bool(true), Value::Int(3)]);
    }

    #[test]
    fn update_binds_assignments_before_conditions() {
        let statement = Statement::new(
            StatementKind::Update,
            "Supplier",
            "proveedores",
            Filter::new().eq("id", 42_i64).into_predicates(),
            Assignments::new().set("nombre", "Molinos del Sur"),
            Some(TenantScope {
                column: "panaderia_id",
                tenant_id: TenantId::new(3),
            }),
        );
        let (sql, params) = statement.to_sql();
        assert_eq!(
            sql,
            "UPDATE proveedores SET nombre = $1 WHERE id = $2 AND panaderia_id = $3"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn null_predicates_render_as_is_null() {
        let statement = Statement::new(
            StatementKind::Delete,
            "Supplier",
            "proveedores",
            Filter::new().eq("email", Value::Null).into_predicates(),
            Assignments::new(),
            None,
        );
        let (sql, params) = statement.to_sql();
        assert_eq!(sql, "DELETE FROM proveedores WHERE email IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn matches_requires_tenant_and_predicates() {
        let statement = scoped_select();
        assert!(statement.matches(&row(json!({"id": 1, "panaderia_id": 3, "activo": true}))));
        assert!(!statement.matches(&row(json!({"id": 2, "panaderia_id": 5, "activo": true}))));
        assert!(!statement.matches(&row(json!({"id": 3, "panaderia_id": 3, "activo": false}))));
        assert!(!statement.matches(&row(json!({"id": 4, "activo": true}))));
    }

    #[test]
    fn numeric_comparison_crosses_int_and_float() {
        let predicate = Predicate {
            column: "precio".to_string(),
            op: Op::Gt,
            value: Value::Int(10),
        };
        assert!(predicate.matches(&row(json!({"precio": 12.5}))));
        assert!(!predicate.matches(&row(json!({"precio": 9}))));
        assert!(!predicate.matches(&row(json!({"precio": "12"}))));
    }

    #[test]
    fn assignments_replace_duplicate_columns() {
        let assignments = Assignments::new().set("nombre", "a").set("nombre", "b");
        assert_eq!(assignments.iter().count(), 1);
        assert_eq!(assignments.get("nombre"), Some(&Value::Text("b".to_string())));
    }

    #[test]
    fn assignments_from_json_reject_nested_values() {
        let ok = Assignments::from_json_object(&row(json!({"nombre": "x", "activo": true})));
        assert!(ok.is_ok());
        let nested = Assignments::from_json_object(&row(json!({"direccion": {"calle": "x"}})));
        assert_eq!(nested, Err("direccion".to_string()));
    }

    #[test]
    fn identifiers_are_restricted() {
        assert!(is_valid_identifier("panaderia_id"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("nombre; DROP TABLE proveedores"));
        assert!(!is_valid_identifier("Nombre"));
        assert!(!is_valid_identifier(""));
    }
}
