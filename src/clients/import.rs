use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::db::clients::ClientFields;

static DOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- DOB: (\d{1,2}/\d{1,2}/\d{4})").unwrap());

/// A CSV row keyed by header.
pub type Row = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvFormat {
    /// Customer export from Square.
    Square,
    /// Any other export, matched by common column names.
    Generic,
}

#[derive(Debug)]
pub struct ParsedRow {
    /// 1-based position among the non-empty data rows.
    pub row: usize,
    pub data: Row,
    pub fields: Result<ClientFields, String>,
}

pub fn detect_format(headers: &[String]) -> CsvFormat {
    let has = |name: &str| headers.iter().any(|h| h == name);
    if has("First Name") && has("Last Name") && has("Square Customer ID") {
        CsvFormat::Square
    } else {
        CsvFormat::Generic
    }
}

/// Parse `text` into client rows. A header that cannot be read fails the
/// whole import; a bad row only fails that row.
pub fn parse(text: &str) -> Result<(CsvFormat, Vec<ParsedRow>), csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let format = detect_format(&headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let row_number = rows.len() + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                rows.push(ParsedRow {
                    row: row_number,
                    data: Row::new(),
                    fields: Err(e.to_string()),
                });
                continue;
            }
        };
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let data: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        let fields = match format {
            CsvFormat::Square => square_row(&data),
            CsvFormat::Generic => generic_row(&data),
        };
        rows.push(ParsedRow {
            row: row_number,
            data,
            fields,
        });
    }
    Ok((format, rows))
}

/// First non-empty value among `keys`.
fn pick(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_empty())
        .cloned()
}

fn generic_row(row: &Row) -> Result<ClientFields, String> {
    let name = pick(row, &["name"]).ok_or_else(|| "Name is required".to_string())?;
    Ok(ClientFields {
        name,
        email: pick(row, &["email"]),
        phone: pick(row, &["phone", "phoneNumber", "contact"]),
        cell_phone: pick(row, &["cellPhone", "mobilePhone", "mobile", "cell"]),
        work_phone: pick(row, &["workPhone", "businessPhone", "officePhone"]),
        fax: pick(row, &["fax", "faxNumber"]),
        address: pick(row, &["address", "location", "streetAddress"]),
        city: pick(row, &["city"]),
        state: pick(row, &["state", "province", "region"]),
        zip_code: pick(row, &["zipCode", "postalCode", "zip"]),
        country: pick(row, &["country"]),
        date_of_birth: pick(row, &["dateOfBirth", "dob", "birthdate", "birthday"]),
        gender: pick(row, &["gender", "sex"]),
        occupation: pick(row, &["occupation", "job", "profession"]),
        company: pick(row, &["company", "organization", "employer"]),
        referred_by: pick(row, &["referredBy", "referral", "referralSource"]),
        emergency_contact: pick(row, &["emergencyContact", "emergency"]),
        emergency_phone: pick(row, &["emergencyPhone", "emergencyContactPhone"]),
        insurance_provider: pick(row, &["insuranceProvider", "insurance", "provider"]),
        insurance_id: pick(row, &["insuranceId", "policyNumber", "insuranceNumber"]),
        notes: pick(row, &["notes", "comments", "description"]),
    })
}

fn clean_phone(raw: &str) -> String {
    let unquoted = raw.trim_matches('\'');
    unquoted.strip_prefix('+').unwrap_or(unquoted).to_string()
}

fn square_row(row: &Row) -> Result<ClientFields, String> {
    let first = pick(row, &["First Name"]).unwrap_or_default();
    let mut last = pick(row, &["Last Name"]).unwrap_or_default();

    let mut date_of_birth = None;
    if let Some(caps) = DOB_RE.captures(&last) {
        date_of_birth = Some(caps[1].to_string());
        last = DOB_RE.replace(&last, "").trim().to_string();
    }
    if date_of_birth.is_none() {
        date_of_birth = pick(row, &["Birthday"]).filter(|b| !b.trim().is_empty());
    }

    let name = format!("{first} {last}").trim().to_string();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    let address = match (
        pick(row, &["Street Address 1"]),
        pick(row, &["Street Address 2"]).filter(|s| !s.trim().is_empty()),
    ) {
        (Some(one), Some(two)) => Some(format!("{one}, {two}")),
        (one, two) => one.or(two),
    };

    let memo = pick(row, &["Memo"]).filter(|m| !m.trim().is_empty());
    let square_info: Vec<String> = [
        "Square Customer ID",
        "Creation Source",
        "First Visit",
        "Last Visit",
        "Transaction Count",
        "Total Spend",
    ]
    .iter()
    .filter_map(|key| pick(row, &[key]).map(|v| format!("{key}: {v}")))
    .collect();

    let notes = if square_info.is_empty() {
        memo
    } else {
        let block = format!("Square Information:\n{}", square_info.join("\n"));
        Some(match memo {
            Some(memo) => format!("{memo}\n\n{block}"),
            None => block,
        })
    };

    Ok(ClientFields {
        name,
        email: pick(row, &["Email Address"]),
        phone: pick(row, &["Phone Number"]).map(|p| clean_phone(&p)),
        address,
        city: pick(row, &["City"]),
        state: pick(row, &["State"]),
        zip_code: pick(row, &["Postal Code"]),
        country: pick(row, &["Country"]),
        date_of_birth,
        company: pick(row, &["Company Name"]),
        referred_by: pick(row, &["Referred By"]),
        notes,
        ..Default::default()
    })
}
