//! Typed predicate and mutation builder
//!
//! Declarative filter and update descriptions are expressed as a small AST and
//! compiled into parameterized PostgreSQL fragments:
//!
//! - [`Clause`]: groups of [`Condition`]s, each group sharing one [`Comparison`]
//!   and one inner [`Join`], the groups combined by an outer [`Join`]
//! - [`Assignments`]: `SET` / `VALUES` column lists, including the JSON array
//!   append used for audit history
//! - [`OrderBy`]: sort keys
//!
//! [`Statement`] assembles the final SQL. A placeholder is allocated at the
//! moment its value is pushed, so argument order always equals placeholder order.
//!
//! ```rust,ignore
//! let clause = Clause::all()
//!     .group(Group::all(Comparison::Equal).with(OrderColumn::Paid, false))
//!     .group(Group::all(Comparison::GreaterThanOrEqual).with(OrderColumn::Amount, 10.0));
//!
//! let mut stmt = Statement::new("SELECT * FROM orders");
//! stmt.filter(&clause);
//! assert_eq!(stmt.sql(), "SELECT * FROM orders WHERE paid = $1 AND amount >= $2");
//! ```

use crate::core::field::FieldValue;
use crate::core::query::{SortDirection, Window};
use std::fmt;

/// A column of a persisted entity.
///
/// Implemented by one enum per table so that clauses can only reference
/// columns that exist.
pub trait Column: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// The SQL column name
    fn name(self) -> &'static str;
}

/// Comparison applied to every condition of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    In,
    GreaterThanOrEqual,
    LessThanOrEqual,
    /// Case-insensitive pattern match (`%` and `_` wildcards)
    ILike,
}

impl Comparison {
    pub fn operator(self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::In => "IN",
            Comparison::GreaterThanOrEqual => ">=",
            Comparison::LessThanOrEqual => "<=",
            Comparison::ILike => "ILIKE",
        }
    }
}

/// Boolean connective between conditions or between groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Join {
    #[default]
    And,
    Or,
}

impl Join {
    fn separator(self) -> &'static str {
        match self {
            Join::And => " AND ",
            Join::Or => " OR ",
        }
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single bound value
    Value(FieldValue),
    /// Membership in a set of bound values
    Set(Vec<FieldValue>),
    /// A trusted SQL fragment emitted verbatim in place of the whole condition
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition<C> {
    pub column: C,
    pub operand: Operand,
}

/// A set of conditions sharing one comparison and one join
#[derive(Debug, Clone, PartialEq)]
pub struct Group<C> {
    comparison: Comparison,
    join: Join,
    conditions: Vec<Condition<C>>,
}

impl<C: Column> Group<C> {
    pub fn new(comparison: Comparison, join: Join) -> Self {
        Self {
            comparison,
            join,
            conditions: Vec::new(),
        }
    }

    /// Conditions joined with AND
    pub fn all(comparison: Comparison) -> Self {
        Self::new(comparison, Join::And)
    }

    /// Conditions joined with OR
    pub fn any(comparison: Comparison) -> Self {
        Self::new(comparison, Join::Or)
    }

    pub fn with(mut self, column: C, value: impl Into<FieldValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn with_set<I, V>(mut self, column: C, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.conditions.push(Condition {
            column,
            operand: Operand::Set(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn with_raw(mut self, column: C, fragment: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            column,
            operand: Operand::Raw(fragment.into()),
        });
        self
    }

    /// Add a scalar condition in place, for groups built up conditionally
    pub fn push(&mut self, column: C, value: impl Into<FieldValue>) {
        self.conditions.push(Condition {
            column,
            operand: Operand::Value(value.into()),
        });
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn join(&self) -> Join {
        self.join
    }

    pub fn conditions(&self) -> &[Condition<C>] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Groups of conditions combined by an outer join
#[derive(Debug, Clone, PartialEq)]
pub struct Clause<C> {
    join: Join,
    groups: Vec<Group<C>>,
}

impl<C: Column> Clause<C> {
    pub fn new(join: Join) -> Self {
        Self {
            join,
            groups: Vec::new(),
        }
    }

    /// Groups joined with AND
    pub fn all() -> Self {
        Self::new(Join::And)
    }

    /// Groups joined with OR
    pub fn any() -> Self {
        Self::new(Join::Or)
    }

    /// Shorthand for a single equality condition
    pub fn eq(column: C, value: impl Into<FieldValue>) -> Self {
        Self::all().group(Group::all(Comparison::Equal).with(column, value))
    }

    pub fn group(mut self, group: Group<C>) -> Self {
        self.groups.push(group);
        self
    }

    pub fn join(&self) -> Join {
        self.join
    }

    pub fn groups(&self) -> &[Group<C>] {
        &self.groups
    }

    /// True when no group carries a condition; such a clause filters nothing
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Group::is_empty)
    }
}

/// How a column is written by an UPDATE or INSERT
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `col = $n`
    Set(FieldValue),
    /// `col = col || $n::jsonb`, appending a JSON array to a JSON array column
    Append(FieldValue),
}

/// Column assignments for `SET` and `VALUES` lists
#[derive(Debug, Clone, PartialEq)]
pub struct Assignments<C> {
    entries: Vec<(C, Assignment)>,
    returning: bool,
}

impl<C: Column> Default for Assignments<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Column> Assignments<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            returning: false,
        }
    }

    pub fn set(mut self, column: C, value: impl Into<FieldValue>) -> Self {
        self.entries.push((column, Assignment::Set(value.into())));
        self
    }

    /// Append the elements of a JSON array to the column's existing array
    pub fn append(mut self, column: C, items: serde_json::Value) -> Self {
        self.entries
            .push((column, Assignment::Append(FieldValue::Json(items))));
        self
    }

    /// Request the updated row back (`RETURNING *`)
    pub fn returning_all(mut self) -> Self {
        self.returning = true;
        self
    }

    pub fn entries(&self) -> &[(C, Assignment)] {
        &self.entries
    }

    pub fn returns(&self) -> bool {
        self.returning
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy<C> {
    pub column: C,
    pub direction: SortDirection,
}

impl<C: Column> OrderBy<C> {
    pub fn new(column: C, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

/// A SQL statement under construction together with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    args: Vec<FieldValue>,
}

impl Statement {
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            sql: head.into(),
            args: Vec::new(),
        }
    }

    /// Push an argument and return its placeholder
    pub fn bind(&mut self, value: FieldValue) -> String {
        self.args.push(value);
        format!("${}", self.args.len())
    }

    pub fn push_sql(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Append ` WHERE ...` unless the clause is empty
    pub fn filter<C: Column>(&mut self, clause: &Clause<C>) -> &mut Self {
        if let Some(predicate) = self.render_clause(clause) {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&predicate);
        }
        self
    }

    /// Append ` SET a = $1, b = $2`
    pub fn assign<C: Column>(&mut self, assignments: &Assignments<C>) -> &mut Self {
        let mut parts = Vec::with_capacity(assignments.entries.len());
        for (column, assignment) in &assignments.entries {
            let column = column.name();
            let part = match assignment {
                Assignment::Set(value) => {
                    let placeholder = self.bind(value.clone());
                    format!("{column} = {placeholder}")
                }
                Assignment::Append(value) => {
                    let placeholder = self.bind(value.clone());
                    format!("{column} = {column} || {placeholder}::jsonb")
                }
            };
            parts.push(part);
        }
        self.sql.push_str(" SET ");
        self.sql.push_str(&parts.join(", "));
        self
    }

    /// Append ` (a, b) VALUES ($1, $2)`; appends insert their value as-is
    pub fn values<C: Column>(&mut self, assignments: &Assignments<C>) -> &mut Self {
        let mut columns = Vec::with_capacity(assignments.entries.len());
        let mut placeholders = Vec::with_capacity(assignments.entries.len());
        for (column, assignment) in &assignments.entries {
            let value = match assignment {
                Assignment::Set(value) | Assignment::Append(value) => value.clone(),
            };
            columns.push(column.name());
            placeholders.push(self.bind(value));
        }
        self.sql.push_str(&format!(
            " ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ));
        self
    }

    pub fn order_by<C: Column>(&mut self, keys: &[OrderBy<C>]) -> &mut Self {
        if keys.is_empty() {
            return self;
        }
        let keys: Vec<String> = keys
            .iter()
            .map(|key| format!("{} {}", key.column.name(), key.direction.keyword()))
            .collect();
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(&keys.join(", "));
        self
    }

    /// Append LIMIT and OFFSET; zero means unbounded and emits nothing
    pub fn window(&mut self, window: Window) -> &mut Self {
        if window.limit > 0 {
            let placeholder = self.bind(FieldValue::from(window.limit));
            self.sql.push_str(&format!(" LIMIT {placeholder}"));
        }
        if window.offset > 0 {
            let placeholder = self.bind(FieldValue::from(window.offset));
            self.sql.push_str(&format!(" OFFSET {placeholder}"));
        }
        self
    }

    pub fn for_update(&mut self) -> &mut Self {
        self.sql.push_str(" FOR UPDATE");
        self
    }

    /// Append ` RETURNING *` when the assignments asked for it
    pub fn returning<C: Column>(&mut self, assignments: &Assignments<C>) -> &mut Self {
        if assignments.returning {
            self.sql.push_str(" RETURNING *");
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[FieldValue] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<FieldValue>) {
        (self.sql, self.args)
    }

    fn render_clause<C: Column>(&mut self, clause: &Clause<C>) -> Option<String> {
        let mut rendered = Vec::new();
        for group in clause.groups.iter().filter(|g| !g.is_empty()) {
            rendered.push(self.render_group(group));
        }
        if rendered.is_empty() {
            None
        } else {
            Some(rendered.join(clause.join.separator()))
        }
    }

    fn render_group<C: Column>(&mut self, group: &Group<C>) -> String {
        let mut parts = Vec::with_capacity(group.conditions.len());
        for condition in &group.conditions {
            parts.push(self.render_condition(group.comparison, condition));
        }
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            format!("({})", parts.join(group.join.separator()))
        }
    }

    fn render_condition<C: Column>(
        &mut self,
        comparison: Comparison,
        condition: &Condition<C>,
    ) -> String {
        let column = condition.column.name();
        match &condition.operand {
            Operand::Raw(fragment) => format!("({fragment})"),
            Operand::Set(values) => self.render_membership(column, values),
            Operand::Value(value) => match comparison {
                Comparison::In => self.render_membership(column, std::slice::from_ref(value)),
                Comparison::Equal if value.is_null() => format!("{column} IS NULL"),
                _ => {
                    let placeholder = self.bind(value.clone());
                    format!("{column} {} {placeholder}", comparison.operator())
                }
            },
        }
    }

    fn render_membership(&mut self, column: &str, values: &[FieldValue]) -> String {
        if values.is_empty() {
            return "FALSE".to_string();
        }
        let placeholders: Vec<String> = values.iter().map(|v| self.bind(v.clone())).collect();
        format!("{column} IN ({})", placeholders.join(", "))
    }
}
