use crate::errors::ConvertError;
use crate::mapping::{Field, Mapping};
use crate::reader::Record;
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::str::FromStr;

/// OFX caps `NAME` at 32 characters.
const MAX_PAYEE_LEN: usize = 32;

/// OFX caps `MEMO` at 255 characters.
const MAX_MEMO_LEN: usize = 255;

/// Largest absolute amount accepted from a row. Keeps statement totals and
/// two-decimal rendering inside `Decimal`'s range.
const MAX_AMOUNT: Decimal = Decimal::from_parts(2764472320, 232830, 0, false, 0);

/// Date layouts seen in Nordea exports, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y/%m/%d", "%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Consecutive records sharing the same account.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub account: String,
    pub records: Vec<Record>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub account: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub payee: String,
    pub notes: String,
    pub currency: String,

    /// Financial institution transaction id, unique within one document once
    /// the transactions have been cleaned.
    pub fitid: String,
}

impl Transaction {
    /// The memo line: notes if present, otherwise the description when it
    /// says something the payee does not.
    pub fn memo(&self) -> &str {
        if !self.notes.is_empty() {
            &self.notes
        } else if self.description != self.payee {
            &self.description
        } else {
            ""
        }
    }
}

/// The built transactions of a single group, before cleaning.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltGroup {
    pub account: String,
    pub transactions: Vec<Transaction>,
}

/// A cleaned group, ready to be rendered as one OFX statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub account: String,
    pub currency: String,
    pub transactions: Vec<Transaction>,
}

impl Statement {
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(|tx| tx.date).min()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(|tx| tx.date).max()
    }

    pub fn balance(&self) -> Decimal {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }
}

/// Partitions records into runs of the same account, keeping file order.
pub fn group<I>(records: I, mapping: &Mapping) -> Result<Vec<Group>, ConvertError>
where
    I: IntoIterator<Item = Result<Record, ConvertError>>,
{
    let mut groups: Vec<Group> = Vec::new();

    for record in records {
        let record = record?;
        let account = mapping.resolve(Field::Account, &record)?;

        match groups.last_mut() {
            Some(current) if current.account == account => current.records.push(record),
            _ => groups.push(Group {
                account,
                records: vec![record],
            }),
        }
    }

    Ok(groups)
}

/// Resolves every mapped field of every grouped record.
pub fn build(groups: Vec<Group>, mapping: &Mapping) -> Result<Vec<BuiltGroup>, ConvertError> {
    let mut built = Vec::with_capacity(groups.len());

    for group in groups {
        let mut transactions = Vec::with_capacity(group.records.len());
        let mut balance = Decimal::ZERO;

        for record in &group.records {
            let tx = build_transaction(&group.account, record, mapping)?;
            balance = balance
                .checked_add(tx.amount)
                .ok_or_else(|| ConvertError::Mapping {
                    field: Field::Amount,
                    line: record.line,
                    value: tx.amount.to_string(),
                    reason: String::from("balance overflows"),
                })?;
            transactions.push(tx);
        }

        debug!(
            "built {} transactions for account {}",
            transactions.len(),
            group.account
        );

        built.push(BuiltGroup {
            account: group.account,
            transactions,
        });
    }

    Ok(built)
}

fn build_transaction(
    account: &str,
    record: &Record,
    mapping: &Mapping,
) -> Result<Transaction, ConvertError> {
    let raw_date = mapping.resolve(Field::Date, record)?;
    let date = parse_date(&raw_date).ok_or_else(|| ConvertError::Mapping {
        field: Field::Date,
        line: record.line,
        value: raw_date.clone(),
        reason: String::from("unrecognised date format"),
    })?;

    let raw_amount = mapping.resolve(Field::Amount, record)?;
    let amount = parse_amount(&raw_amount).map_err(|reason| ConvertError::Mapping {
        field: Field::Amount,
        line: record.line,
        value: raw_amount.clone(),
        reason,
    })?;

    let mut tx = Transaction {
        account: account.to_string(),
        date,
        amount,
        description: mapping.resolve(Field::Desc, record)?,
        payee: mapping.resolve(Field::Payee, record)?,
        notes: mapping.resolve(Field::Notes, record)?,
        currency: mapping.resolve(Field::Currency, record)?,
        fitid: String::new(),
    };
    tx.fitid = fitid(&tx);

    Ok(tx)
}

/// Normalises built transactions into statements.
///
/// Text fields get their whitespace collapsed and are cut to OFX length
/// limits, and repeated fitids get a `-N` suffix so every id in the document
/// is unique. Transactions are never dropped or reordered; only groups left
/// without transactions disappear.
pub fn clean(groups: Vec<BuiltGroup>) -> Vec<Statement> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    groups
        .into_iter()
        .filter(|group| !group.transactions.is_empty())
        .map(|group| {
            let transactions: Vec<Transaction> = group
                .transactions
                .into_iter()
                .map(|mut tx| {
                    tx.account = collapse_whitespace(&tx.account);
                    tx.description = truncate(&collapse_whitespace(&tx.description), MAX_MEMO_LEN);
                    tx.payee = truncate(&collapse_whitespace(&tx.payee), MAX_PAYEE_LEN);
                    tx.notes = truncate(&collapse_whitespace(&tx.notes), MAX_MEMO_LEN);

                    let count = seen.entry(tx.fitid.clone()).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        tx.fitid = format!("{}-{}", tx.fitid, count);
                    }

                    tx
                })
                .collect();

            Statement {
                account: collapse_whitespace(&group.account),
                currency: transactions[0].currency.clone(),
                transactions,
            }
        })
        .collect()
}

/// Parses amounts such as `-5,00`, `+1 234,56`, `1.234,56` or `12.5`.
pub fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\'')
        .collect();
    let unsigned = compact.strip_prefix('+').unwrap_or(&compact);

    if unsigned.is_empty() {
        return Err(String::from("amount is empty"));
    }

    let normalised = if unsigned.contains(',') {
        // Comma is the decimal mark; any points are thousands separators.
        unsigned.replace('.', "").replace(',', ".")
    } else {
        unsigned.to_string()
    };

    let amount = Decimal::from_str(&normalised).map_err(|err| err.to_string())?;
    if amount.abs() > MAX_AMOUNT {
        return Err(format!("amount exceeds {}", MAX_AMOUNT));
    }

    Ok(amount)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

fn fitid(tx: &Transaction) -> String {
    let date = tx.date.format("%Y%m%d").to_string();
    let amount = tx.amount.normalize().to_string();

    let mut hasher = Sha256::new();
    for part in [&tx.account, &date, &amount, &tx.payee, &tx.notes] {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(&hasher.finalize()[..16])
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_records_from;
    use rust_decimal_macros::dec;

    const HEADER: &str = "Maksaja;Kirjauspäivä;Määrä;Otsikko";

    fn pipeline(input: &str) -> Result<Vec<Statement>, ConvertError> {
        let mapping = Mapping::nordea();
        let records = read_records_from(input.as_bytes(), &mapping)?;
        let groups = group(records, &mapping)?;
        let built = build(groups, &mapping)?;
        Ok(clean(built))
    }

    #[test]
    fn should_parse_finnish_amounts() {
        assert_eq!(parse_amount("10,00").unwrap(), dec!(10.00));
        assert_eq!(parse_amount("-5,00").unwrap(), dec!(-5.00));
        assert_eq!(parse_amount("+1 234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount("1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount("-12.5").unwrap(), dec!(-12.5));
        assert_eq!(parse_amount("1\u{a0}000,00").unwrap(), dec!(1000.00));
    }

    #[test]
    fn should_reject_unparsable_amounts() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("ten euros").is_err());
        assert!(parse_amount("1,2,3").is_err());
    }

    #[test]
    fn should_reject_amounts_beyond_the_supported_range() {
        assert_eq!(parse_amount("1000000000000000").unwrap(), MAX_AMOUNT);
        assert_eq!(parse_amount("-1000000000000000,00").unwrap(), -MAX_AMOUNT);
        assert!(parse_amount("1000000000000000,01").is_err());
        assert!(parse_amount("79228162514264337593543950335").is_err());
    }

    #[test]
    fn should_report_mapping_problem_for_oversized_amounts() {
        // Two amounts whose sum would not fit in a Decimal.
        let input = format!(
            "{}\nA;2023/01/15;79228162514264337593543950335;x\nA;2023/01/15;1;y\n",
            HEADER
        );

        match pipeline(&input).unwrap_err() {
            ConvertError::Mapping { field, line, .. } => {
                assert_eq!(field, Field::Amount);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn should_parse_supported_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 15);
        assert_eq!(parse_date("2023/01/15"), expected);
        assert_eq!(parse_date("15.01.2023"), expected);
        assert_eq!(parse_date("2023-01-15"), expected);
        assert_eq!(parse_date("15/01/2023"), expected);
        assert_eq!(parse_date("Varaus"), None);
    }

    #[test]
    fn should_build_one_transaction_per_row_in_order() {
        let input = format!(
            "{}\nFI01;2023/01/02;10,00;Palkka\nFI01;2023/01/03;-5,00;K-Market\nFI01;2023/01/04;-1,50;Kahvi\n",
            HEADER
        );
        let statements = pipeline(&input).unwrap();

        assert_eq!(statements.len(), 1);
        let amounts: Vec<Decimal> = statements[0]
            .transactions
            .iter()
            .map(|tx| tx.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(10.00), dec!(-5.00), dec!(-1.50)]);
        assert!(statements[0]
            .transactions
            .iter()
            .all(|tx| tx.currency == "EUR"));
        assert_eq!(statements[0].balance(), dec!(3.50));
    }

    #[test]
    fn should_group_consecutive_rows_by_account_without_reordering() {
        let input = format!(
            "{}\nA;2023/01/02;1,00;x\nA;2023/01/03;2,00;y\nB;2023/01/04;3,00;z\nA;2023/01/05;4,00;w\n",
            HEADER
        );
        let statements = pipeline(&input).unwrap();

        let accounts: Vec<&str> = statements.iter().map(|s| s.account.as_str()).collect();
        assert_eq!(accounts, vec!["A", "B", "A"]);
        assert_eq!(statements[0].transactions.len(), 2);
        assert_eq!(statements[2].transactions[0].amount, dec!(4.00));
    }

    #[test]
    fn should_fail_with_missing_field_for_short_rows() {
        let input = format!("{}\nA;2023/01/02;1,00;x\nA;2023/01/03\n", HEADER);

        match pipeline(&input).unwrap_err() {
            ConvertError::MissingField { field, line, .. } => {
                assert_eq!(field, Field::Amount);
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn should_fail_with_missing_field_when_header_lacks_column() {
        let input = "Kirjauspäivä;Määrä;Otsikko\n2023/01/02;1,00;x\n";

        match pipeline(input).unwrap_err() {
            ConvertError::MissingField { column, .. } => assert_eq!(column, "Maksaja"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn should_report_mapping_problem_for_bad_amount() {
        let input = format!("{}\nA;2023/01/02;abc;x\n", HEADER);

        match pipeline(&input).unwrap_err() {
            ConvertError::Mapping { field, value, .. } => {
                assert_eq!(field, Field::Amount);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn should_report_mapping_problem_for_bad_date() {
        let input = format!("{}\nA;Varaus;-3,00;x\n", HEADER);
        assert!(matches!(
            pipeline(&input).unwrap_err(),
            ConvertError::Mapping {
                field: Field::Date,
                ..
            }
        ));
    }

    #[test]
    fn should_make_duplicate_fitids_unique() {
        let input = format!(
            "{}\nA;2023/01/02;-2,00;Kahvi\nA;2023/01/02;-2,00;Kahvi\nA;2023/01/02;-2,00;Kahvi\n",
            HEADER
        );
        let statements = pipeline(&input).unwrap();
        let ids: Vec<&str> = statements[0]
            .transactions
            .iter()
            .map(|tx| tx.fitid.as_str())
            .collect();

        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], format!("{}-2", ids[0]));
        assert_eq!(ids[2], format!("{}-3", ids[0]));
    }

    #[test]
    fn should_derive_stable_fitids() {
        let input = format!("{}\nA;2023/01/02;-2,00;Kahvi\n", HEADER);
        let first = pipeline(&input).unwrap();
        let second = pipeline(&input).unwrap();

        assert_eq!(first[0].transactions[0].fitid.len(), 32);
        assert_eq!(first, second);
    }

    #[test]
    fn should_collapse_whitespace_and_truncate_payee() {
        let input = format!(
            "{}\nA;2023/01/02;-2,00;VERY   LONG MERCHANT NAME THAT KEEPS GOING ON AND ON\n",
            HEADER
        );
        let tx = &pipeline(&input).unwrap()[0].transactions[0];

        assert_eq!(tx.payee, "VERY LONG MERCHANT NAME THAT KEE");
        assert_eq!(tx.payee.chars().count(), MAX_PAYEE_LEN);
        assert_eq!(
            tx.description,
            "VERY LONG MERCHANT NAME THAT KEEPS GOING ON AND ON"
        );
        assert_eq!(tx.memo(), tx.description);
    }

    #[test]
    fn should_prefer_notes_as_memo() {
        let input = "Maksaja;Kirjauspäivä;Määrä;Otsikko;Notes\nA;2023/01/02;-2,00;Kahvi;with cake\n";
        let tx = &pipeline(input).unwrap()[0].transactions[0];
        assert_eq!(tx.memo(), "with cake");
    }

    #[test]
    fn should_produce_no_statements_for_empty_input() {
        assert!(pipeline(HEADER).unwrap().is_empty());
    }
}
