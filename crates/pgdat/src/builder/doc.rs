//! JSON projections shared by [`SelectDocBuilder`](super::SelectDocBuilder)
//! and [`JsqlBuilder`](super::JsqlBuilder).

use crate::buf::write_ident;
use crate::error::BuildError;
use crate::fragment::SubInfo;
use crate::value::Value;

#[derive(Clone, Debug)]
pub(crate) struct DocParts {
    pub(crate) many: Vec<SubInfo>,
    pub(crate) vector: Vec<SubInfo>,
    pub(crate) one: Vec<SubInfo>,
    pub(crate) scalar: Vec<SubInfo>,
    /// Emit the outer `row_to_json` wrapper.
    pub(crate) is_parent: bool,
}

impl Default for DocParts {
    fn default() -> Self {
        Self {
            many: Vec::new(),
            vector: Vec::new(),
            one: Vec::new(),
            scalar: Vec::new(),
            is_parent: true,
        }
    }
}

impl DocParts {
    pub(crate) fn is_empty(&self) -> bool {
        self.many.is_empty() && self.vector.is_empty() && self.one.is_empty() && self.scalar.is_empty()
    }

    /// Write `,<projection>` for every sub-query, in Many, Vector, One, Scalar order.
    ///
    /// When `leading` is false the first projection has no comma.
    pub(crate) fn write_projections(
        &self,
        buf: &mut String,
        args: &mut Vec<Value>,
        mut leading: bool,
    ) -> Result<(), BuildError> {
        let groups: [(&[SubInfo], Projection); 4] = [
            (&self.many, Projection::Many),
            (&self.vector, Projection::Vector),
            (&self.one, Projection::One),
            (&self.scalar, Projection::Scalar),
        ];
        for (subs, kind) in groups {
            for sub in subs {
                if leading {
                    buf.push(',');
                }
                leading = true;
                write_projection(buf, args, sub, kind)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Projection {
    Many,
    Vector,
    One,
    Scalar,
}

fn write_projection(
    buf: &mut String,
    args: &mut Vec<Value>,
    sub: &SubInfo,
    kind: Projection,
) -> Result<(), BuildError> {
    let alias = format!("dat__{}", sub.alias);
    let (head, tail) = match kind {
        Projection::Many => (format!("(SELECT array_agg({alias}.*) FROM ("), format!(") AS {alias})")),
        Projection::Vector => (
            format!("(SELECT array_agg({alias}.dat__scalar) FROM ("),
            format!(") AS {alias}(dat__scalar))"),
        ),
        Projection::One => (format!("(SELECT row_to_json({alias}.*) FROM ("), format!(") AS {alias})")),
        Projection::Scalar => (
            format!("(SELECT {alias}.dat__scalar FROM ("),
            format!(") AS {alias}(dat__scalar) LIMIT 1)"),
        ),
    };
    buf.push_str(&head);
    sub.write_body(buf, args);
    buf.push_str(&tail);
    buf.push_str(" AS ");
    write_ident(buf, &sub.alias)
}

pub(crate) const ITEM_OPEN: &str = "SELECT row_to_json(dat__item.*) FROM (";
pub(crate) const ITEM_CLOSE: &str = ") as dat__item";
