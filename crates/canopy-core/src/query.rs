//! SOQL statement builder.
//!
//! User-supplied values reach query text through [`SoqlQuery::filter`]
//! only, which quotes and escapes in one place; no call site concatenates
//! raw strings into a statement.

/// Builder for the simple `SELECT ... FROM ... WHERE a = 'x' AND ...`
/// statements this crate issues.
#[derive(Debug, Clone)]
pub struct SoqlQuery {
    fields: Vec<&'static str>,
    from: &'static str,
    filters: Vec<(&'static str, String)>,
}

impl SoqlQuery {
    pub fn new(from: &'static str) -> Self {
        Self {
            fields: Vec::new(),
            from,
            filters: Vec::new(),
        }
    }

    pub fn fields(mut self, fields: &[&'static str]) -> Self {
        self.fields.extend_from_slice(fields);
        self
    }

    /// Add an equality predicate; `value` is escaped and quoted.
    pub fn filter(mut self, field: &'static str, value: &str) -> Self {
        self.filters.push((field, quote(value)));
        self
    }

    pub fn build(&self) -> String {
        let mut soql = format!("SELECT {} FROM {}", self.fields.join(", "), self.from);
        for (index, (field, value)) in self.filters.iter().enumerate() {
            let keyword = if index == 0 { " WHERE" } else { " AND" };
            soql.push_str(&format!("{keyword} {field} = {value}"));
        }
        soql
    }
}

/// Quote a string literal, escaping backslashes and single quotes.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_select_with_filters() {
        let soql = SoqlQuery::new("SubscriberPackageVersion")
            .fields(&["Id", "InstallValidationStatus"])
            .filter("Id", "04t000000000001AAA")
            .filter("InstallationKey", "hunter2")
            .build();

        assert_eq!(
            soql,
            "SELECT Id, InstallValidationStatus FROM SubscriberPackageVersion \
             WHERE Id = '04t000000000001AAA' AND InstallationKey = 'hunter2'"
        );
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        let soql = SoqlQuery::new("SubscriberPackageVersion")
            .fields(&["Id"])
            .filter("InstallationKey", r"it's\secret")
            .build();

        assert!(soql.ends_with(r"InstallationKey = 'it\'s\\secret'"));
    }

    #[test]
    fn no_filters_means_no_where_clause() {
        let soql = SoqlQuery::new("Profile").fields(&["Id", "Name"]).build();
        assert_eq!(soql, "SELECT Id, Name FROM Profile");
    }
}
