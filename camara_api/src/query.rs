//! Query builders for the list endpoints.
//!
//! Every paginated endpoint takes `pagina`/`itens`/`ordem`/`ordenarPor`;
//! the per-resource builders add their own window or filter parameters.

use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trait implemented by all query builders. Provides parameter
/// serialization and shared builder methods for pagination and sort order.
pub trait Query {
    /// The `(name, value)` pairs to append to the request URL.
    fn params(&self) -> Vec<(&'static str, String)>;

    /// Returns a mutable reference to the common query fields.
    fn get_common(&mut self) -> &mut QueryCommon;

    /// Sets the page number (1-indexed).
    fn with_page(mut self, page: i64) -> Self
    where
        Self: Sized,
    {
        self.get_common().page = page;
        self
    }

    /// Sets the number of results per page.
    fn with_page_size(mut self, page_size: i64) -> Self
    where
        Self: Sized,
    {
        self.get_common().page_size = Some(page_size);
        self
    }

    /// Sets the sort direction.
    fn with_sort_direction(mut self, sort_direction: SortDirection) -> Self
    where
        Self: Sized,
    {
        self.get_common().sort_direction = sort_direction;
        self
    }
}

/// Sort order for list results.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum SortDirection {
    /// Ascending order (oldest/smallest first). This is the default: pages
    /// are ingested in order, so the most recent data lands last.
    #[default]
    Asc,
    /// Descending order (newest/largest first).
    Desc,
}

impl SortDirection {
    fn as_param(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Fields shared by all query types: pagination and sort direction.
#[derive(Clone, Copy)]
pub struct QueryCommon {
    /// Page number (1-indexed). Defaults to 1.
    pub page: i64,
    /// Results per page. `None` uses the API default.
    pub page_size: Option<i64>,
    /// Sort direction. Defaults to ascending.
    pub sort_direction: SortDirection,
}

impl Default for QueryCommon {
    fn default() -> QueryCommon {
        QueryCommon {
            page: 1,
            page_size: None,
            sort_direction: SortDirection::Asc,
        }
    }
}

impl QueryCommon {
    fn push_params(&self, sort_key: &'static str, out: &mut Vec<(&'static str, String)>) {
        out.push(("pagina", self.page.to_string()));
        if let Some(page_size) = self.page_size {
            out.push(("itens", page_size.to_string()));
        }
        out.push(("ordem", self.sort_direction.as_param().to_string()));
        out.push(("ordenarPor", sort_key.to_string()));
    }
}

/// Query for `/deputados`.
#[derive(Default)]
pub struct LegislatorQuery {
    pub common: QueryCommon,
}

impl Query for LegislatorQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        self.common.push_params("id", &mut out);
        out
    }

    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }
}

/// Query for `/deputados/{id}/despesas`.
#[derive(Default)]
pub struct ExpenseQuery {
    pub common: QueryCommon,
    /// Calendar year the expenses were charged against.
    pub year: Option<i32>,
}

impl ExpenseQuery {
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

impl Query for ExpenseQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(year) = self.year {
            out.push(("ano", year.to_string()));
        }
        self.common.push_params("dataDocumento", &mut out);
        out
    }

    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }
}

/// Query for `/proposicoes`. The API rejects presentation-date windows
/// wider than about 90 days, so callers split larger ranges first.
#[derive(Default)]
pub struct BillQuery {
    pub common: QueryCommon,
    pub presented_from: Option<NaiveDate>,
    pub presented_to: Option<NaiveDate>,
}

impl BillQuery {
    pub fn with_window(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.presented_from = Some(from);
        self.presented_to = Some(to);
        self
    }
}

impl Query for BillQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(from) = self.presented_from {
            out.push(("dataApresentacaoInicio", from.format(DATE_FORMAT).to_string()));
        }
        if let Some(to) = self.presented_to {
            out.push(("dataApresentacaoFim", to.format(DATE_FORMAT).to_string()));
        }
        self.common.push_params("id", &mut out);
        out
    }

    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }
}

/// Query for `/votacoes`. Same ~90-day window restriction as bills.
#[derive(Default)]
pub struct RollCallQuery {
    pub common: QueryCommon,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RollCallQuery {
    pub fn with_window(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

impl Query for RollCallQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(from) = self.from {
            out.push(("dataInicio", from.format(DATE_FORMAT).to_string()));
        }
        if let Some(to) = self.to {
            out.push(("dataFim", to.format(DATE_FORMAT).to_string()));
        }
        self.common.push_params("dataHoraRegistro", &mut out);
        out
    }

    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }
}
