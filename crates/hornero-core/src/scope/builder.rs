//! Scoped query builder.
//!
//! Every statement built here is constrained to the tenant of the request
//! context, unless the context is super-admin. The tenant constraint travels
//! inside the statement itself so updates and deletes cannot be split into a
//! "check, then act" pair.

use crate::context::{ContextCell, ContextError, RequestContext};
use crate::error::{ScopeError, ScopeResult, TenantSecurityViolation};
use crate::query::{
    is_valid_identifier, Assignments, Filter, Op, Predicate, Statement, StatementKind,
    TenantScope, Value,
};
use crate::scope::entity::{
    Entity, EntityInfo, EntityRegistry, RecordId, Tenancy, ID_COLUMN, TENANT_COLUMN,
};
use crate::tenant::TenantId;

#[derive(Debug, Clone, Copy)]
pub struct ScopedQueryBuilder<'a> {
    ctx: &'a RequestContext,
}

impl<'a> ScopedQueryBuilder<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub fn from_cell(cell: &'a ContextCell) -> ScopeResult<Self> {
        cell.current()
            .map(Self::new)
            .ok_or_else(|| ScopeError::Context(ContextError::NotEstablished))
    }

    pub fn context(&self) -> &'a RequestContext {
        self.ctx
    }

    pub fn select<E: Entity>(&self, filter: Filter) -> ScopeResult<Statement> {
        self.select_info(E::info(), filter)
    }

    pub fn select_by_id<E: Entity>(&self, id: RecordId) -> ScopeResult<Statement> {
        self.select_info(E::info(), Filter::new().eq(ID_COLUMN, id))
    }

    /// Select on a table named at runtime, resolved through the allow-list.
    pub fn select_named(
        &self,
        registry: &EntityRegistry,
        table: &str,
        filter: Filter,
    ) -> ScopeResult<Statement> {
        let info = registry.lookup(table)?;
        self.select_info(info, filter)
    }

    /// Without `explicit_tenant` the record goes to the context tenant.
    /// Super-admins have no tenant of their own and must name one.
    pub fn insert<E: Entity>(
        &self,
        values: Assignments,
        explicit_tenant: Option<TenantId>,
    ) -> ScopeResult<Statement> {
        let info = E::info();
        let mut values = values;
        check_assignment_columns(&values)?;

        // A tenant passed inside the values is treated like an explicit one.
        let embedded = values
            .remove(TENANT_COLUMN)
            .map(|value| tenant_from_value(info.name, &value))
            .transpose()?;
        let requested = explicit_tenant.or(embedded);

        if info.tenancy == Tenancy::Exempt {
            self.note_exempt(info, StatementKind::Insert);
            return Ok(Statement::new(
                StatementKind::Insert,
                info.name,
                info.table,
                Vec::new(),
                values,
                None,
            ));
        }

        let owner = match (self.ctx.is_super_admin(), self.ctx.tenant_id(), requested) {
            (true, _, Some(tenant)) => tenant,
            (true, _, None) => return Err(ScopeError::TenantRequired { entity: info.name }),
            (false, Some(own), None) => own,
            (false, Some(own), Some(tenant)) if tenant == own => own,
            (false, Some(own), Some(tenant)) => {
                return Err(TenantSecurityViolation::ForeignTenantInsert {
                    entity: info.name,
                    requested: tenant,
                    context: own,
                }
                .logged()
                .into())
            }
            (false, None, _) => return Err(ScopeError::Context(ContextError::NotEstablished)),
        };

        Ok(Statement::new(
            StatementKind::Insert,
            info.name,
            info.table,
            Vec::new(),
            values.set(TENANT_COLUMN, owner),
            None,
        ))
    }

    pub fn update<E: Entity>(&self, filter: Filter, values: Assignments) -> ScopeResult<Statement> {
        let info = E::info();
        check_assignment_columns(&values)?;
        if info.is_owned() && values.contains(TENANT_COLUMN) {
            return Err(TenantSecurityViolation::TenantReassignment { entity: info.name }
                .logged()
                .into());
        }
        self.mutation(info, StatementKind::Update, filter, values)
    }

    pub fn delete<E: Entity>(&self, filter: Filter) -> ScopeResult<Statement> {
        self.mutation(E::info(), StatementKind::Delete, filter, Assignments::new())
    }

    fn select_info(&self, info: EntityInfo, filter: Filter) -> ScopeResult<Statement> {
        let predicates = self.checked_predicates(info, filter)?;
        let scope = self.scope_for(info, StatementKind::Select)?;
        Ok(Statement::new(
            StatementKind::Select,
            info.name,
            info.table,
            predicates,
            Assignments::new(),
            scope,
        ))
    }

    fn mutation(
        &self,
        info: EntityInfo,
        kind: StatementKind,
        filter: Filter,
        values: Assignments,
    ) -> ScopeResult<Statement> {
        let predicates = self.checked_predicates(info, filter)?;
        let scope = self.scope_for(info, kind)?;
        if scope.is_none() && predicates.is_empty() {
            return Err(ScopeError::UnboundedMutation {
                kind: kind.as_str(),
                entity: info.name,
            });
        }
        Ok(Statement::new(kind, info.name, info.table, predicates, values, scope))
    }

    fn scope_for(&self, info: EntityInfo, kind: StatementKind) -> ScopeResult<Option<TenantScope>> {
        if info.tenancy == Tenancy::Exempt {
            self.note_exempt(info, kind);
            return Ok(None);
        }
        if self.ctx.is_super_admin() {
            tracing::debug!(
                entity = info.name,
                kind = kind.as_str(),
                "super-admin statement built without tenant constraint"
            );
            return Ok(None);
        }
        let tenant_id = self
            .ctx
            .tenant_id()
            .ok_or(ScopeError::Context(ContextError::NotEstablished))?;
        Ok(Some(TenantScope {
            column: TENANT_COLUMN,
            tenant_id,
        }))
    }

    /// Validates column names and rejects caller filters that point at a
    /// tenant other than the context's.
    fn checked_predicates(&self, info: EntityInfo, filter: Filter) -> ScopeResult<Vec<Predicate>> {
        let predicates = filter.into_predicates();
        for predicate in &predicates {
            if !is_valid_identifier(&predicate.column) {
                return Err(ScopeError::InvalidColumn(predicate.column.clone()));
            }
            if !info.is_owned() || predicate.column != TENANT_COLUMN || self.ctx.is_super_admin() {
                continue;
            }
            let Some(own) = self.ctx.tenant_id() else {
                continue;
            };
            let agrees = predicate.op == Op::Eq && predicate.value == Value::from(own);
            if !agrees {
                return Err(TenantSecurityViolation::TenantFilterMismatch {
                    entity: info.name,
                    requested: format!("{} {:?}", predicate.op.as_sql(), predicate.value),
                    context: own,
                }
                .logged()
                .into());
            }
        }
        Ok(predicates)
    }

    fn note_exempt(&self, info: EntityInfo, kind: StatementKind) {
        tracing::debug!(
            entity = info.name,
            table = info.table,
            kind = kind.as_str(),
            "tenant-exempt entity accessed without tenant constraint"
        );
    }
}

fn check_assignment_columns(values: &Assignments) -> ScopeResult<()> {
    for (column, _) in values.iter() {
        if !is_valid_identifier(column) {
            return Err(ScopeError::InvalidColumn(column.to_string()));
        }
        if column == ID_COLUMN {
            return Err(ScopeError::ReservedColumn(column.to_string()));
        }
    }
    Ok(())
}

fn tenant_from_value(entity: &'static str, value: &Value) -> ScopeResult<TenantId> {
    value
        .as_i64()
        .filter(|id| *id > 0)
        .map(TenantId::new)
        .ok_or(ScopeError::TenantRequired { entity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolutionSource;
    use crate::entities::{SubscriptionPlan, Supplier};

    fn tenant(id: i64) -> RequestContext {
        RequestContext::for_tenant(TenantId::new(id), ResolutionSource::AuthenticatedUser)
    }

    #[test]
    fn select_adds_tenant_scope_for_owned_entity() {
        let ctx = tenant(3);
        let statement = ScopedQueryBuilder::new(&ctx)
            .select::<Supplier>(Filter::new().eq("activo", true))
            .unwrap();

        assert_eq!(
            statement.scope(),
            Some(TenantScope {
                column: TENANT_COLUMN,
                tenant_id: TenantId::new(3)
            })
        );
        assert_eq!(statement.predicates().len(), 1);
    }

    #[test]
    fn super_admin_select_has_no_scope() {
        let ctx = RequestContext::super_admin();
        let statement = ScopedQueryBuilder::new(&ctx)
            .select::<Supplier>(Filter::new())
            .unwrap();
        assert!(statement.scope().is_none());
    }

    #[test]
    fn exempt_entity_is_never_scoped() {
        let ctx = tenant(3);
        let statement = ScopedQueryBuilder::new(&ctx)
            .select::<SubscriptionPlan>(Filter::new())
            .unwrap();
        assert!(statement.scope().is_none());
    }

    #[test]
    fn filter_naming_own_tenant_is_allowed() {
        let ctx = tenant(3);
        let result = ScopedQueryBuilder::new(&ctx)
            .select::<Supplier>(Filter::new().eq(TENANT_COLUMN, TenantId::new(3)));
        assert!(result.is_ok());
    }

    #[test]
    fn filter_naming_foreign_tenant_is_a_violation() {
        let ctx = tenant(3);
        let err = ScopedQueryBuilder::new(&ctx)
            .select::<Supplier>(Filter::new().eq(TENANT_COLUMN, TenantId::new(5)))
            .unwrap_err();
        assert!(matches!(
            err.as_violation(),
            Some(TenantSecurityViolation::TenantFilterMismatch { .. })
        ));

        let widened = ScopedQueryBuilder::new(&ctx)
            .select::<Supplier>(Filter::new().ne(TENANT_COLUMN, TenantId::new(3)))
            .unwrap_err();
        assert!(widened.is_violation());
    }

    #[test]
    fn insert_injects_context_tenant() {
        let ctx = tenant(3);
        let statement = ScopedQueryBuilder::new(&ctx)
            .insert::<Supplier>(Assignments::new().set("nombre", "Harinas Norte"), None)
            .unwrap();
        assert_eq!(
            statement.assignments().get(TENANT_COLUMN),
            Some(&Value::Int(3))
        );
    }

    #[test]
    fn insert_into_foreign_tenant_is_a_violation() {
        let ctx = tenant(3);
        let err = ScopedQueryBuilder::new(&ctx)
            .insert::<Supplier>(Assignments::new().set(TENANT_COLUMN, 5_i64), None)
            .unwrap_err();
        assert!(matches!(
            err.as_violation(),
            Some(TenantSecurityViolation::ForeignTenantInsert { .. })
        ));
    }

    #[test]
    fn super_admin_insert_requires_explicit_tenant() {
        let ctx = RequestContext::super_admin();
        let builder = ScopedQueryBuilder::new(&ctx);
        assert!(matches!(
            builder.insert::<Supplier>(Assignments::new().set("nombre", "x"), None),
            Err(ScopeError::TenantRequired { entity: "Supplier" })
        ));

        let statement = builder
            .insert::<Supplier>(Assignments::new().set("nombre", "x"), Some(TenantId::new(5)))
            .unwrap();
        assert_eq!(statement.assignments().get(TENANT_COLUMN), Some(&Value::Int(5)));
    }

    #[test]
    fn update_cannot_reassign_tenant() {
        let ctx = RequestContext::super_admin();
        let err = ScopedQueryBuilder::new(&ctx)
            .update::<Supplier>(
                Filter::new().eq(ID_COLUMN, 1_i64),
                Assignments::new().set(TENANT_COLUMN, 4_i64),
            )
            .unwrap_err();
        assert!(matches!(
            err.as_violation(),
            Some(TenantSecurityViolation::TenantReassignment { .. })
        ));
    }

    #[test]
    fn delete_carries_tenant_in_same_statement() {
        let ctx = tenant(3);
        let statement = ScopedQueryBuilder::new(&ctx)
            .delete::<Supplier>(Filter::new().eq(ID_COLUMN, 42_i64))
            .unwrap();
        let (sql, _) = statement.to_sql();
        assert_eq!(sql, "DELETE FROM proveedores WHERE id = $1 AND panaderia_id = $2");
    }

    #[test]
    fn unfiltered_super_admin_delete_is_refused() {
        let ctx = RequestContext::super_admin();
        assert!(matches!(
            ScopedQueryBuilder::new(&ctx).delete::<Supplier>(Filter::new()),
            Err(ScopeError::UnboundedMutation { .. })
        ));
    }

    #[test]
    fn invalid_and_reserved_columns_are_rejected() {
        let ctx = tenant(3);
        let builder = ScopedQueryBuilder::new(&ctx);
        assert!(matches!(
            builder.select::<Supplier>(Filter::new().eq("nombre OR 1=1", "x")),
            Err(ScopeError::InvalidColumn(_))
        ));
        assert!(matches!(
            builder.insert::<Supplier>(Assignments::new().set(ID_COLUMN, 9_i64), None),
            Err(ScopeError::ReservedColumn(_))
        ));
    }

    #[test]
    fn named_select_goes_through_allow_list() {
        let ctx = tenant(3);
        let registry = EntityRegistry::new().register::<Supplier>().unwrap();
        let builder = ScopedQueryBuilder::new(&ctx);

        let statement = builder
            .select_named(&registry, "proveedores", Filter::new())
            .unwrap();
        assert!(statement.scope().is_some());

        let err = builder
            .select_named(&registry, "configuracion", Filter::new())
            .unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn from_cell_requires_established_context() {
        let cell = ContextCell::new();
        assert!(matches!(
            ScopedQueryBuilder::from_cell(&cell),
            Err(ScopeError::Context(_))
        ));
        cell.establish(tenant(3)).unwrap();
        assert!(ScopedQueryBuilder::from_cell(&cell).is_ok());
    }
}
