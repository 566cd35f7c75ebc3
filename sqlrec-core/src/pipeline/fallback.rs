//! Deterministic, model-free scoring query.
//!
//! The score of a catalog program is the number of the user's normalized
//! tokens it matches, summed over four categories:
//!
//! | user tokens                      | catalog side                  |
//! |----------------------------------|-------------------------------|
//! | preferences `training_types`     | program type                  |
//! | preferences `formation_domains`  | taught subjects               |
//! | preferences `job_sectors`        | outcome sectors               |
//! | declared specialties             | favoured specialties          |
//!
//! Programs with a placeholder title or institution are dropped, and the
//! user's budget caps the annual cost when both values are numeric.

use crate::error::RecError;
use crate::types::CandidateSql;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier pattern"));

/// Values treated as a missing title or institution.
const PLACEHOLDERS: &str = "'', '-', 'n/a', 'null', 'none', 'unknown'";

/// Numeric text, no sign, optional fraction.
const NUMERIC: &str = r"'^[0-9]+(\.[0-9]+)?$'";

/// A bare SQL identifier, checked when constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    /// Parse an unquoted identifier (`[A-Za-z_][A-Za-z0-9_]*`, at most 63 chars)
    pub fn parse(name: impl Into<String>) -> Result<Self, RecError> {
        let name = name.into();
        if !IDENT.is_match(&name) {
            return Err(RecError::configuration(format!(
                "invalid SQL identifier: {:?}",
                name
            )));
        }
        Ok(Self(name))
    }

    fn known(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table, column and JSON key names the fallback query reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSchema {
    pub users_table: Ident,
    pub user_id: Ident,
    pub user_budget: Ident,
    /// JSONB object holding the preference lists
    pub user_preferences: Ident,
    /// JSONB array of declared specialties
    pub user_specialties: Ident,
    pub training_types_key: Ident,
    pub formation_domains_key: Ident,
    pub job_sectors_key: Ident,

    pub programs_table: Ident,
    pub program_id: Ident,
    pub program_title: Ident,
    pub program_institution: Ident,
    pub program_annual_cost: Ident,
    pub program_type: Ident,

    /// Link tables share a `program_id`-style foreign key column
    pub link_program_id: Ident,
    pub subjects_table: Ident,
    pub subject: Ident,
    pub sectors_table: Ident,
    pub sector: Ident,
    pub specialties_table: Ident,
    pub specialty: Ident,
}

impl Default for CatalogSchema {
    fn default() -> Self {
        Self {
            users_table: Ident::known("users"),
            user_id: Ident::known("id"),
            user_budget: Ident::known("budget"),
            user_preferences: Ident::known("preferences"),
            user_specialties: Ident::known("specialties"),
            training_types_key: Ident::known("training_types"),
            formation_domains_key: Ident::known("formation_domains"),
            job_sectors_key: Ident::known("job_sectors"),

            programs_table: Ident::known("programs"),
            program_id: Ident::known("id"),
            program_title: Ident::known("title"),
            program_institution: Ident::known("institution"),
            program_annual_cost: Ident::known("annual_cost"),
            program_type: Ident::known("program_type"),

            link_program_id: Ident::known("program_id"),
            subjects_table: Ident::known("program_subjects"),
            subject: Ident::known("subject"),
            sectors_table: Ident::known("program_sectors"),
            sector: Ident::known("sector"),
            specialties_table: Ident::known("program_specialties"),
            specialty: Ident::known("specialty"),
        }
    }
}

/// Builds the fallback scoring query against a [`CatalogSchema`].
#[derive(Debug, Clone, Default)]
pub struct FallbackQueryBuilder {
    schema: CatalogSchema,
}

impl FallbackQueryBuilder {
    pub fn new(schema: CatalogSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    /// Token CTE over a JSONB array; non-arrays and blanks yield no rows.
    fn token_cte(name: &str, array_expr: &str) -> String {
        format!(
            "{name} AS (\n    \
                SELECT DISTINCT lower(btrim(t.token)) AS token\n    \
                FROM rec_target,\n         \
                jsonb_array_elements_text(\n             \
                    CASE WHEN jsonb_typeof({array_expr}) = 'array'\n                  \
                    THEN {array_expr} ELSE '[]'::jsonb END\n         \
                ) AS t(token)\n    \
                WHERE btrim(t.token) <> ''\n)"
        )
    }

    /// Points for one linked category: distinct user tokens found among the
    /// program's linked values.
    fn link_score(&self, table: &Ident, column: &Ident, tokens: &str) -> String {
        let link = &self.schema.link_program_id;
        format!(
            "(SELECT count(DISTINCT k.token) FROM {table} l \
             JOIN {tokens} k ON k.token = lower(btrim(l.{column}::text)) \
             WHERE l.{link} = c.id)"
        )
    }

    /// Build the query for `user_id`, truncated to `top_k` rows.
    pub fn build(&self, user_id: i64, top_k: u32) -> CandidateSql {
        let s = &self.schema;
        let top_k = top_k.max(1);

        let prefs = |key: &Ident| format!("rec_target.prefs -> '{key}'");
        let training = Self::token_cte("rec_training", &prefs(&s.training_types_key));
        let domains = Self::token_cte("rec_domains", &prefs(&s.formation_domains_key));
        let sectors = Self::token_cte("rec_sectors", &prefs(&s.job_sectors_key));
        let specialties = Self::token_cte("rec_specialties", "rec_target.specs");

        let domain_score = self.link_score(&s.subjects_table, &s.subject, "rec_domains");
        let sector_score = self.link_score(&s.sectors_table, &s.sector, "rec_sectors");
        let specialty_score =
            self.link_score(&s.specialties_table, &s.specialty, "rec_specialties");

        format!(
            "WITH rec_target AS (\n    \
                SELECT u.{prefs_col} AS prefs,\n           \
                       u.{specs_col} AS specs,\n           \
                       CASE WHEN btrim(u.{budget}::text) ~ {NUMERIC}\n                \
                            THEN btrim(u.{budget}::text)::numeric END AS budget\n    \
                FROM {users} u\n    \
                WHERE u.{user_id_col} = {user_id}\n\
             ),\n\
             {training},\n\
             {domains},\n\
             {sectors},\n\
             {specialties},\n\
             rec_candidates AS (\n    \
                SELECT c.id, c.kind\n    \
                FROM (\n        \
                    SELECT p.{pid} AS id,\n               \
                           p.{ptype} AS kind,\n               \
                           p.{title} AS title,\n               \
                           p.{institution} AS institution,\n               \
                           CASE WHEN btrim(p.{cost}::text) ~ {NUMERIC}\n                    \
                                THEN btrim(p.{cost}::text)::numeric END AS cost\n        \
                    FROM {programs} p\n    \
                ) c\n    \
                LEFT JOIN rec_target ON TRUE\n    \
                WHERE c.title IS NOT NULL\n      \
                  AND lower(btrim(c.title::text)) NOT IN ({PLACEHOLDERS})\n      \
                  AND c.institution IS NOT NULL\n      \
                  AND lower(btrim(c.institution::text)) NOT IN ({PLACEHOLDERS})\n      \
                  AND (rec_target.budget IS NULL OR c.cost IS NULL OR c.cost <= rec_target.budget)\n\
             ),\n\
             rec_scored AS (\n    \
                SELECT c.id,\n           \
                       (SELECT count(*) FROM rec_training k WHERE k.token = lower(btrim(c.kind::text)))\n         \
                     + {domain_score}\n         \
                     + {sector_score}\n         \
                     + {specialty_score} AS score\n    \
                FROM rec_candidates c\n\
             )\n\
             SELECT id, score\n\
             FROM rec_scored\n\
             ORDER BY score DESC NULLS LAST, id ASC\n\
             LIMIT {top_k};",
            prefs_col = s.user_preferences,
            specs_col = s.user_specialties,
            budget = s.user_budget,
            users = s.users_table,
            user_id_col = s.user_id,
            pid = s.program_id,
            ptype = s.program_type,
            title = s.program_title,
            institution = s.program_institution,
            cost = s.program_annual_cost,
            programs = s.programs_table,
        )
        .into()
    }
}

/// Build the fallback query against the default catalog schema.
pub fn build_fallback_query(user_id: i64, top_k: u32) -> CandidateSql {
    FallbackQueryBuilder::default().build(user_id, top_k)
}
