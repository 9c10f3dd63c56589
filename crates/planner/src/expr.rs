//! Native typed expression trees.

use arrow_schema::{DataType, Schema};
use ffq_common::{FfqError, Result};
use serde::{Deserialize, Serialize};

use crate::literal::LiteralValue;

/// Typed scalar expression evaluated against one input schema.
///
/// Columns are addressed by position. Conditionals are plain calls named
/// `"if"` whose arguments alternate condition and result, with a trailing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(LiteralValue),
    Column {
        index: usize,
        data_type: DataType,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        return_type: DataType,
    },
}

impl Expr {
    /// Reference to column `index` of `schema`.
    pub fn column(schema: &Schema, index: usize) -> Result<Expr> {
        let field = schema.fields().get(index).ok_or_else(|| {
            FfqError::Structural(format!(
                "column index {index} out of range for schema of {} fields",
                schema.fields().len()
            ))
        })?;
        Ok(Expr::Column {
            index,
            data_type: field.data_type().clone(),
        })
    }

    pub fn literal(value: LiteralValue) -> Expr {
        Expr::Literal(value)
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, return_type: DataType) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
            return_type,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Literal(v) => v.data_type(),
            Expr::Column { data_type, .. } => data_type.clone(),
            Expr::Call { return_type, .. } => return_type.clone(),
        }
    }

    /// Column index when this is a direct column reference.
    pub fn as_column(&self) -> Option<usize> {
        match self {
            Expr::Column { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Checks every column reference against `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        match self {
            Expr::Literal(_) => Ok(()),
            Expr::Column { index, .. } => {
                if *index >= schema.fields().len() {
                    return Err(FfqError::Structural(format!(
                        "column index {index} out of range for schema of {} fields",
                        schema.fields().len()
                    )));
                }
                Ok(())
            }
            Expr::Call { args, .. } => args.iter().try_for_each(|a| a.validate(schema)),
        }
    }

    /// Deepest nesting level of this tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Call { args, .. } => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
            _ => 1,
        }
    }
}

/// One aggregate function invocation inside an aggregation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub return_type: DataType,
    /// Optional boolean expression selecting the rows fed into this call.
    pub mask: Option<Expr>,
}

impl AggregateCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>, return_type: DataType) -> Self {
        Self {
            name: name.into(),
            args,
            return_type,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Expr) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for a in &self.args {
            a.validate(schema)?;
        }
        if let Some(mask) = &self.mask {
            mask.validate(schema)?;
            if mask.data_type() != DataType::Boolean {
                return Err(FfqError::Structural(format!(
                    "aggregate mask of {} must be boolean, got {}",
                    self.name,
                    mask.data_type()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::Field;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Utf8, true),
        ])
    }

    #[test]
    fn column_picks_type_from_schema() {
        let e = Expr::column(&schema(), 1).expect("column");
        assert_eq!(e.data_type(), DataType::Utf8);
        assert_eq!(e.as_column(), Some(1));
        assert!(Expr::column(&schema(), 2).is_err());
    }

    #[test]
    fn validate_catches_nested_out_of_range_reference() {
        let bad = Expr::call(
            "plus",
            vec![
                Expr::literal(LiteralValue::Int32(1)),
                Expr::Column {
                    index: 5,
                    data_type: DataType::Int32,
                },
            ],
            DataType::Int32,
        );
        assert!(matches!(bad.validate(&schema()), Err(FfqError::Structural(_))));
        assert_eq!(bad.depth(), 2);
    }

    #[test]
    fn aggregate_mask_must_be_boolean() {
        let call = AggregateCall::new("count", vec![], DataType::Int64)
            .with_mask(Expr::column(&schema(), 0).expect("column"));
        assert!(call.validate(&schema()).is_err());
    }
}
