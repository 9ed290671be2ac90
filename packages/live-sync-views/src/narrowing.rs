//! Single-row narrowing of a view statement.

use live_sync_core::statement::expr::{ColumnRef, Expr};
use live_sync_core::{KeyValueDataEvent, Params, Result, SelectStatement};

/// Prefix of generated narrowing parameters.
pub const NARROW_PARAM_PREFIX: &str = "__narrow_";

/// A copy of a view statement restricted to the rows joined with one
/// changed row, plus the parameters it needs beyond the view's own.
#[derive(Debug, Clone)]
pub struct NarrowedStatement {
    /// Index of the FromRef the change was matched to
    pub from_ref: usize,
    pub statement: SelectStatement,
    pub params: Params,
}

/// Builds one narrowed statement per FromRef of `statement` that reads
/// `change.name` and is tracked.
///
/// The key of the changed row is decoded with that table's primary index
/// and turned into `field = @__narrow_N` conditions, or `field IS NULL`
/// for an empty non-text part. Fields are qualified with the FromRef's
/// alias or table name unless the statement reads a single table. The conjunction goes into the WHERE clause for the anchor
/// and into the JOIN condition otherwise, so LEFT JOIN rows outside the
/// change keep their empty side.
pub fn narrow(
    statement: &SelectStatement,
    tracked: &[bool],
    change: &KeyValueDataEvent,
) -> Result<Vec<NarrowedStatement>> {
    let single = statement.from_refs().len() == 1;
    let mut narrowed = Vec::new();
    let mut counter = 0usize;

    for (index, from_ref) in statement.from_refs().iter().enumerate() {
        if from_ref.table.name != change.name || !tracked.get(index).copied().unwrap_or(false) {
            continue;
        }
        let qualifier = if single {
            None
        } else {
            Some(from_ref.qualifier().to_string())
        };

        let mut params = Params::new();
        let mut conditions = Vec::new();
        for (field, value) in from_ref.table.decode_key_value(&change.key_value)? {
            let column = ColumnRef::resolved(qualifier.clone(), field, index);
            if value.is_null() {
                conditions.push(Expr::IsNull {
                    expr: Box::new(Expr::Column(column)),
                    negated: false,
                });
                continue;
            }
            let name = format!("{}{}", NARROW_PARAM_PREFIX, counter);
            counter += 1;
            conditions.push(Expr::column_eq_param(column, name.clone()));
            params.insert(name, value);
        }
        let Some(condition) = Expr::conjunction(conditions) else {
            continue;
        };
        narrowed.push(NarrowedStatement {
            from_ref: index,
            statement: statement.narrowed(index, condition),
            params,
        });
    }
    Ok(narrowed)
}
