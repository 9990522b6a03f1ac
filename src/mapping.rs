use crate::errors::ConvertError;
use crate::reader::Record;
use std::fmt;
use std::fmt::Formatter;

/// The semantic fields an OFX transaction is assembled from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Account,
    Date,
    Amount,
    Desc,
    Payee,
    Notes,
    Currency,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Account => "account",
            Field::Date => "date",
            Field::Amount => "amount",
            Field::Desc => "desc",
            Field::Payee => "payee",
            Field::Notes => "notes",
            Field::Currency => "currency",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a single field is extracted from a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldRule {
    /// Take the value of a named column. The column must be present.
    Column(&'static str),

    /// Take the value of a named column, or an empty string when the export
    /// does not carry that column.
    OptionalColumn(&'static str),

    /// A literal that does not depend on the row.
    Constant(&'static str),
}

/// A declarative description of one bank's CSV export.
#[derive(Clone, Debug)]
pub struct Mapping {
    pub delimiter: u8,
    pub has_header: bool,

    /// `BANKID` written to the statement's account aggregate.
    pub bank_id: &'static str,

    /// `ACCTTYPE` written to the statement's account aggregate.
    pub account_type: &'static str,

    pub account: FieldRule,
    pub date: FieldRule,
    pub amount: FieldRule,
    pub desc: FieldRule,
    pub payee: FieldRule,
    pub notes: FieldRule,
    pub currency: FieldRule,
}

impl Mapping {
    /// Mapping for the Finnish Nordea netbank account export.
    pub fn nordea() -> Self {
        Self {
            delimiter: b';',
            has_header: true,
            bank_id: "NDEAFIHH",
            account_type: "CHECKING",
            account: FieldRule::Column("Maksaja"),
            date: FieldRule::Column("Kirjauspäivä"),
            amount: FieldRule::Column("Määrä"),
            desc: FieldRule::Column("Otsikko"),
            payee: FieldRule::Column("Otsikko"),
            notes: FieldRule::OptionalColumn("Notes"),
            currency: FieldRule::Constant("EUR"),
        }
    }

    pub fn rule(&self, field: Field) -> &FieldRule {
        match field {
            Field::Account => &self.account,
            Field::Date => &self.date,
            Field::Amount => &self.amount,
            Field::Desc => &self.desc,
            Field::Payee => &self.payee,
            Field::Notes => &self.notes,
            Field::Currency => &self.currency,
        }
    }

    /// Evaluates the rule for `field` against a single record.
    pub fn resolve(&self, field: Field, record: &Record) -> Result<String, ConvertError> {
        match self.rule(field) {
            FieldRule::Column(column) => match record.values.get(*column) {
                Some(value) => Ok(value.clone()),
                None => Err(ConvertError::MissingField {
                    field,
                    column: column.to_string(),
                    line: record.line,
                }),
            },
            FieldRule::OptionalColumn(column) => {
                Ok(record.values.get(*column).cloned().unwrap_or_default())
            }
            FieldRule::Constant(value) => Ok(value.to_string()),
        }
    }
}
