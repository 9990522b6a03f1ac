use crate::mapping::Mapping;
use crate::transactions::{Statement, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;

const DATE_FORMAT: &str = "%Y%m%d000000";

/// Renders cleaned statements as an OFX 1.02 (SGML) document.
///
/// The document is produced as a sequence of text chunks: [`Ofx::header`],
/// then the chunks from [`Ofx::body`], then [`Ofx::footer`]. Concatenated in
/// that order they form the complete file.
pub struct Ofx<'a> {
    mapping: &'a Mapping,
    server_date: NaiveDate,
}

impl<'a> Ofx<'a> {
    /// `server_date` is reported as `DTSERVER`. Deriving it from the data
    /// rather than the clock keeps the output reproducible.
    pub fn new(mapping: &'a Mapping, server_date: NaiveDate) -> Self {
        Self {
            mapping,
            server_date,
        }
    }

    pub fn header(&self) -> String {
        format!(
            "OFXHEADER:100\n\
             DATA:OFXSGML\n\
             VERSION:102\n\
             SECURITY:NONE\n\
             ENCODING:UTF-8\n\
             CHARSET:NONE\n\
             COMPRESSION:NONE\n\
             OLDFILEUID:NONE\n\
             NEWFILEUID:NONE\n\
             \n\
             <OFX>\n\
             \t<SIGNONMSGSRSV1>\n\
             \t\t<SONRS>\n\
             \t\t\t<STATUS>\n\
             \t\t\t\t<CODE>0</CODE>\n\
             \t\t\t\t<SEVERITY>INFO</SEVERITY>\n\
             \t\t\t</STATUS>\n\
             \t\t\t<DTSERVER>{}</DTSERVER>\n\
             \t\t\t<LANGUAGE>ENG</LANGUAGE>\n\
             \t\t</SONRS>\n\
             \t</SIGNONMSGSRSV1>\n\
             \t<BANKMSGSRSV1>\n\
             \t\t<STMTTRNRS>\n\
             \t\t\t<TRNUID>0</TRNUID>\n\
             \t\t\t<STATUS>\n\
             \t\t\t\t<CODE>0</CODE>\n\
             \t\t\t\t<SEVERITY>INFO</SEVERITY>\n\
             \t\t\t</STATUS>\n",
            self.server_date.format(DATE_FORMAT)
        )
    }

    /// One opening chunk per statement, one chunk per transaction, and one
    /// closing chunk per statement, in input order.
    pub fn body(&self, statements: &[Statement]) -> Vec<String> {
        let mut chunks = Vec::new();

        for statement in statements {
            chunks.push(self.statement_start(statement));
            chunks.extend(statement.transactions.iter().map(transaction));
            chunks.push(statement_end(statement));
        }

        chunks
    }

    pub fn footer(&self) -> String {
        String::from("\t\t</STMTTRNRS>\n\t</BANKMSGSRSV1>\n</OFX>\n")
    }

    fn statement_start(&self, statement: &Statement) -> String {
        format!(
            "\t\t\t<STMTRS>\n\
             \t\t\t\t<CURDEF>{currency}</CURDEF>\n\
             \t\t\t\t<BANKACCTFROM>\n\
             \t\t\t\t\t<BANKID>{bank}</BANKID>\n\
             \t\t\t\t\t<ACCTID>{account}</ACCTID>\n\
             \t\t\t\t\t<ACCTTYPE>{kind}</ACCTTYPE>\n\
             \t\t\t\t</BANKACCTFROM>\n\
             \t\t\t\t<BANKTRANLIST>\n\
             \t\t\t\t\t<DTSTART>{start}</DTSTART>\n\
             \t\t\t\t\t<DTEND>{end}</DTEND>\n",
            currency = escape(&statement.currency),
            bank = escape(self.mapping.bank_id),
            account = escape(&statement.account),
            kind = self.mapping.account_type,
            start = format_date(statement.start_date().unwrap_or(self.server_date)),
            end = format_date(statement.end_date().unwrap_or(self.server_date)),
        )
    }
}

fn transaction(tx: &Transaction) -> String {
    let kind = if tx.amount.is_sign_negative() {
        "DEBIT"
    } else {
        "CREDIT"
    };

    let memo = match tx.memo() {
        "" => String::new(),
        memo => format!("\t\t\t\t\t\t<MEMO>{}</MEMO>\n", escape(memo)),
    };

    format!(
        "\t\t\t\t\t<STMTTRN>\n\
         \t\t\t\t\t\t<TRNTYPE>{kind}</TRNTYPE>\n\
         \t\t\t\t\t\t<DTPOSTED>{date}</DTPOSTED>\n\
         \t\t\t\t\t\t<TRNAMT>{amount}</TRNAMT>\n\
         \t\t\t\t\t\t<FITID>{fitid}</FITID>\n\
         \t\t\t\t\t\t<NAME>{payee}</NAME>\n\
         {memo}\
         \t\t\t\t\t\t<CURRENCY>\n\
         \t\t\t\t\t\t\t<CURRATE>1.00</CURRATE>\n\
         \t\t\t\t\t\t\t<CURSYM>{currency}</CURSYM>\n\
         \t\t\t\t\t\t</CURRENCY>\n\
         \t\t\t\t\t</STMTTRN>\n",
        kind = kind,
        date = format_date(tx.date),
        amount = format_amount(tx.amount),
        fitid = escape(&tx.fitid),
        payee = escape(&tx.payee),
        memo = memo,
        currency = escape(&tx.currency),
    )
}

fn statement_end(statement: &Statement) -> String {
    format!(
        "\t\t\t\t</BANKTRANLIST>\n\
         \t\t\t\t<LEDGERBAL>\n\
         \t\t\t\t\t<BALAMT>{balance}</BALAMT>\n\
         \t\t\t\t\t<DTASOF>{as_of}</DTASOF>\n\
         \t\t\t\t</LEDGERBAL>\n\
         \t\t\t</STMTRS>\n",
        balance = format_amount(statement.balance()),
        as_of = statement
            .end_date()
            .map(format_date)
            .unwrap_or_default(),
    )
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Two decimals with a `.` separator, e.g. `-5.00`.
fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
