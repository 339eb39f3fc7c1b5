//! Fluent methods shared across builders.
//!
//! Each macro expects the builder to have `clauses: Clauses`, `opts:
//! ExecOptions` and `interpolate: bool` fields as noted.

/// WHERE terms and scopes. Needs `clauses`.
macro_rules! where_methods {
    ($ty:ty) => {
        impl $ty {
            /// Add a WHERE term. Placeholders are relative: `$1` is the first of
            /// `args`. Terms are AND-ed, each in parentheses.
            pub fn where_sql(
                mut self,
                sql: impl Into<String>,
                args: impl $crate::value::IntoArgs,
            ) -> Self {
                let fragment = $crate::fragment::Fragment::sql(sql, args.into_args());
                if let Some(f) = self.clauses.keep(fragment) {
                    self.clauses.wheres.push(f);
                }
                self
            }

            /// Add equality predicates from `(column, value)` pairs.
            ///
            /// `None` gives `IS NULL`, an empty list `(1=0)`, a one-element list
            /// `= $N` and a longer list `IN $N`.
            pub fn where_map<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
            where
                K: Into<String>,
                V: Into<$crate::value::Value>,
            {
                self.clauses
                    .wheres
                    .push($crate::fragment::Fragment::eq(pairs));
                self
            }

            /// Add an expression (or a builder turned into one) as a WHERE term.
            pub fn where_expr(mut self, e: $crate::expr::Expression) -> Self {
                let fragment = $crate::fragment::Fragment::expr(e);
                if let Some(f) = self.clauses.keep(fragment) {
                    self.clauses.wheres.push(f);
                }
                self
            }

            /// Attach a literal scope; its `WHERE` tail is AND-ed with the
            /// builder's own terms.
            pub fn scope(
                mut self,
                sql: impl Into<String>,
                args: impl $crate::value::IntoArgs,
            ) -> Self {
                self.clauses.scope = Some($crate::scope::ScopeSpec::Raw(
                    $crate::scope::RawScope::new(sql, args),
                ));
                self
            }

            /// Attach a named scope with per-call field overrides.
            pub fn scope_map<K, V>(
                mut self,
                scope: &$crate::scope::NamedScope,
                overrides: impl IntoIterator<Item = (K, V)>,
            ) -> Self
            where
                K: Into<String>,
                V: Into<$crate::value::Value>,
            {
                let overrides = overrides
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect();
                self.clauses.scope = Some($crate::scope::ScopeSpec::Named(
                    scope.clone(),
                    overrides,
                ));
                self
            }
        }
    };
}

/// ORDER BY, LIMIT, OFFSET. Needs `clauses`.
macro_rules! paging_methods {
    ($ty:ty) => {
        impl $ty {
            /// Add ORDER BY terms, e.g. `"name DESC"`.
            pub fn order_by(mut self, sql: impl Into<String>) -> Self {
                let fragment = $crate::fragment::Fragment::sql(sql, Vec::new());
                if let Some(f) = self.clauses.keep(fragment) {
                    self.clauses.order.push(f);
                }
                self
            }

            /// ORDER BY term with relative placeholders.
            pub fn order_by_sql(
                mut self,
                sql: impl Into<String>,
                args: impl $crate::value::IntoArgs,
            ) -> Self {
                let fragment = $crate::fragment::Fragment::sql(sql, args.into_args());
                if let Some(f) = self.clauses.keep(fragment) {
                    self.clauses.order.push(f);
                }
                self
            }

            pub fn limit(mut self, n: u64) -> Self {
                self.clauses.limit = Some(n);
                self
            }

            pub fn offset(mut self, n: u64) -> Self {
                self.clauses.offset = Some(n);
                self
            }

            /// `LIMIT per_page OFFSET (page - 1) * per_page`; both must be at least 1.
            pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
                if page < 1 || per_page < 1 {
                    self.clauses.fail($crate::error::BuildError::Invalid(
                        "paginate requires page >= 1 and per_page >= 1".to_string(),
                    ));
                    return self;
                }
                self.clauses.limit = Some(per_page);
                self.clauses.offset = Some((page - 1).saturating_mul(per_page));
                self
            }
        }
    };
}

/// GROUP BY, HAVING, FOR, joins, WITH and UNION. Needs `clauses`.
macro_rules! query_methods {
    ($ty:ty) => {
        impl $ty {
            pub fn group_by<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
                self.clauses.group.extend(cols.into_iter().map(Into::into));
                self
            }

            /// Add a HAVING term with relative placeholders.
            pub fn having_sql(
                mut self,
                sql: impl Into<String>,
                args: impl $crate::value::IntoArgs,
            ) -> Self {
                let fragment = $crate::fragment::Fragment::sql(sql, args.into_args());
                if let Some(f) = self.clauses.keep(fragment) {
                    self.clauses.having.push(f);
                }
                self
            }

            /// Locking clause, e.g. `"UPDATE"` or `"SHARE SKIP LOCKED"`.
            pub fn for_clause(mut self, clause: impl Into<String>) -> Self {
                self.clauses.for_clause = Some(clause.into());
                self
            }

            /// Join a sub-select (or bare table name) under `alias`.
            ///
            /// `kind` is one of `inner`, `left`, `right`, `full` (optionally with
            /// `outer` / `join`); anything else is recorded as an error.
            pub fn join(
                mut self,
                kind: &str,
                sub: impl $crate::subquery::IntoSubquery,
                alias: &str,
                on: &str,
            ) -> Self {
                let kind = $crate::fragment::JoinKind::parse(kind);
                let sub = sub.into_subquery();
                if let (Some(kind), Some(sub)) = (self.clauses.keep(kind), self.clauses.keep(sub)) {
                    self.clauses
                        .joins
                        .push($crate::fragment::Join::new(kind, alias, sub, on));
                }
                self
            }

            pub fn inner_join(
                self,
                sub: impl $crate::subquery::IntoSubquery,
                alias: &str,
                on: &str,
            ) -> Self {
                self.join("inner", sub, alias, on)
            }

            pub fn left_join(
                self,
                sub: impl $crate::subquery::IntoSubquery,
                alias: &str,
                on: &str,
            ) -> Self {
                self.join("left", sub, alias, on)
            }

            pub fn right_join(
                self,
                sub: impl $crate::subquery::IntoSubquery,
                alias: &str,
                on: &str,
            ) -> Self {
                self.join("right", sub, alias, on)
            }

            pub fn full_join(
                self,
                sub: impl $crate::subquery::IntoSubquery,
                alias: &str,
                on: &str,
            ) -> Self {
                self.join("full", sub, alias, on)
            }

            /// Add a CTE: `WITH alias AS (sub)`.
            pub fn with(mut self, alias: &str, sub: impl $crate::subquery::IntoSubquery) -> Self {
                let sub = sub.into_subquery();
                if let Some(sub) = self.clauses.keep(sub) {
                    self.clauses
                        .withs
                        .push($crate::fragment::SubInfo::new(alias, sub));
                }
                self
            }

            /// Add a CTE from literal SQL and its arguments.
            pub fn with_sql(
                self,
                alias: &str,
                sql: impl Into<String>,
                args: impl $crate::value::IntoArgs,
            ) -> Self {
                self.with(alias, $crate::expr::Expression::new(sql, args))
            }

            /// Append `UNION <sub>`.
            pub fn union(mut self, sub: impl $crate::subquery::IntoSubquery) -> Self {
                let sub = sub.into_subquery();
                if let Some(sub) = self.clauses.keep(sub) {
                    self.clauses.union = Some(sub);
                }
                self
            }
        }
    };
}

/// Timeout, cache and interpolation switches. Needs `opts` and `interpolate`.
macro_rules! option_methods {
    ($ty:ty) => {
        impl $ty {
            /// Fail with [`DatError::Timeout`](crate::DatError::Timeout) if the
            /// database call takes longer than `d`.
            pub fn timeout(mut self, d: ::std::time::Duration) -> Self {
                self.opts.timeout = Some(d);
                self
            }

            /// Read-through cache for JSON-shaped results.
            ///
            /// An empty `id` keys the entry by a hash of the SQL. A zero `ttl`
            /// disables caching; `invalidate` forces a refresh.
            pub fn cache(mut self, id: impl Into<String>, ttl: ::std::time::Duration, invalidate: bool) -> Self {
                self.opts.cache = Some($crate::builder::CacheOptions {
                    id: id.into(),
                    ttl,
                    invalidate,
                });
                self
            }

            /// Override the interpolation flag captured at creation.
            pub fn set_is_interpolated(mut self, enabled: bool) -> Self {
                self.interpolate = enabled;
                self
            }
        }
    };
}

/// `Builder` impl boilerplate. Needs `opts` and `interpolate`.
macro_rules! builder_common {
    () => {
        fn is_interpolated(&self) -> bool {
            self.interpolate
        }

        fn exec_options(&self) -> &$crate::builder::ExecOptions {
            &self.opts
        }
    };
}

/// JSON projections for document builders. Needs `doc: DocParts` and `clauses`.
macro_rules! doc_methods {
    ($ty:ty) => {
        impl $ty {
            /// Project `sub`'s rows as a JSON array of objects under `column`.
            pub fn many(mut self, column: &str, sub: impl $crate::subquery::IntoSubquery) -> Self {
                let sub = sub.into_subquery();
                if let Some(sub) = self.clauses.keep(sub) {
                    self.doc.many.push($crate::fragment::SubInfo::new(column, sub));
                }
                self
            }

            /// Project `sub`'s single column as a JSON array of scalars.
            pub fn vector(mut self, column: &str, sub: impl $crate::subquery::IntoSubquery) -> Self {
                let sub = sub.into_subquery();
                if let Some(sub) = self.clauses.keep(sub) {
                    self.doc.vector.push($crate::fragment::SubInfo::new(column, sub));
                }
                self
            }

            /// Project `sub`'s row as a JSON object.
            pub fn one(mut self, column: &str, sub: impl $crate::subquery::IntoSubquery) -> Self {
                let sub = sub.into_subquery();
                if let Some(sub) = self.clauses.keep(sub) {
                    self.doc.one.push($crate::fragment::SubInfo::new(column, sub));
                }
                self
            }

            /// Project the first value of `sub`'s single column.
            pub fn scalar(mut self, column: &str, sub: impl $crate::subquery::IntoSubquery) -> Self {
                let sub = sub.into_subquery();
                if let Some(sub) = self.clauses.keep(sub) {
                    self.doc.scalar.push($crate::fragment::SubInfo::new(column, sub));
                }
                self
            }

            /// Whether this builder emits the outer `row_to_json` wrapper.
            /// Nested document builders clear it automatically.
            pub fn set_is_parent(mut self, parent: bool) -> Self {
                self.doc.is_parent = parent;
                self
            }
        }
    };
}
