//! Side-effect context handed to `oxc_ecmascript`.

use oxc_ast::ast::{Expression, IdentifierReference};
use oxc_ecmascript::GlobalContext;
use oxc_ecmascript::side_effects::{MayHaveSideEffectsContext, PropertyReadSideEffects};
use oxc_semantic::Scoping;

pub(super) struct SideEffectContext<'s> {
    pub(super) scoping: &'s Scoping,
    pub(super) annotations: bool,
    pub(super) pure_functions: &'s [String],
}

impl<'a> GlobalContext<'a> for SideEffectContext<'_> {
    fn is_global_reference(&self, reference: &IdentifierReference<'a>) -> bool {
        reference
            .reference_id
            .get()
            .is_some_and(|id| self.scoping.get_reference(id).symbol_id().is_none())
    }
}

impl<'a> MayHaveSideEffectsContext<'a> for SideEffectContext<'_> {
    fn annotations(&self) -> bool {
        self.annotations
    }

    fn manual_pure_functions(&self, callee: &Expression) -> bool {
        if self.pure_functions.is_empty() {
            return false;
        }
        let name = match callee {
            Expression::Identifier(ident) => ident.name.as_str(),
            Expression::StaticMemberExpression(member) => match &member.object {
                Expression::Identifier(object) => object.name.as_str(),
                _ => return false,
            },
            _ => return false,
        };
        self.pure_functions.iter().any(|pure| pure == name)
    }

    fn property_read_side_effects(&self) -> PropertyReadSideEffects {
        PropertyReadSideEffects::All
    }

    fn unknown_global_side_effects(&self) -> bool {
        true
    }
}
