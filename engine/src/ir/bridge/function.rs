use std::collections::BTreeSet;

use crate::ir::bridge::loc::Loc;
use crate::ir::bridge::shared::Identifier;
use crate::ir::bridge::stmt::Stmt;

/// A function whose body lives in a CFG between `entry` and `exit`
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Function {
    /// function name
    name: Identifier,
    /// formal parameters, in order
    formals: Vec<Identifier>,
    /// variables defined in the body
    locals: BTreeSet<Identifier>,
    /// where the body starts
    entry: Loc,
    /// where the body ends
    exit: Loc,
}

impl Function {
    /// Create a function, deriving its locals from the defining occurrences in `body`
    pub fn new<'a, I>(
        name: Identifier,
        formals: Vec<Identifier>,
        entry: Loc,
        exit: Loc,
        body: I,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Stmt>,
    {
        let locals = body
            .into_iter()
            .filter_map(|stmt| stmt.defined_var())
            .filter(|var| !formals.contains(var))
            .cloned()
            .collect();
        Self {
            name,
            formals,
            locals,
            entry,
            exit,
        }
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn formals(&self) -> &[Identifier] {
        &self.formals
    }

    pub fn locals(&self) -> &BTreeSet<Identifier> {
        &self.locals
    }

    pub fn entry(&self) -> Loc {
        self.entry
    }

    pub fn exit(&self) -> Loc {
        self.exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::bridge::expr::Expr;

    #[test]
    fn locals_come_from_assignments_only() {
        let body = vec![
            Stmt::assign("x", Expr::int(0)),
            Stmt::assign("n", Expr::var("x")),
            Stmt::assign("x", Expr::int(1)),
            Stmt::Expr(Expr::var("y")),
            Stmt::Skip,
        ];
        let func = Function::new(
            "main".into(),
            vec!["n".into()],
            Loc::Entry,
            Loc::Exit,
            &body,
        );
        let locals: Vec<_> = func.locals().iter().map(|v| v.as_ref()).collect();
        assert_eq!(locals, vec!["x"]);
        assert_eq!(func.formals(), &[Identifier::from("n")]);
        assert_eq!(func.entry(), Loc::Entry);
    }
}
