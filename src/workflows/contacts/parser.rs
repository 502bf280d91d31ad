use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::ImportedContact;

/// A data row, or the decoding error that made it unusable.
pub(crate) type ParsedRow = Result<ImportedContact, csv::Error>;

/// Read a contacts export. Spanish and English headers are both accepted.
///
/// Only an unreadable header or an I/O failure rejects the file; a row that cannot be
/// decoded is returned as an error in its position and the rows after it are still read.
pub(crate) fn parse_contacts<R: Read>(reader: R) -> Result<Vec<ParsedRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    csv_reader.headers()?;

    let mut rows = Vec::new();
    for row in csv_reader.deserialize::<ContactRow>() {
        match row {
            Ok(row) => rows.push(Ok(ImportedContact::from(row))),
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(err),
            Err(err) => rows.push(Err(err)),
        }
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    #[serde(
        rename = "Nombre",
        alias = "First Name",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    first_name: Option<String>,
    #[serde(
        rename = "Apellido",
        alias = "Last Name",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    last_name: Option<String>,
    #[serde(
        rename = "Email",
        alias = "E-mail",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    email: Option<String>,
    #[serde(
        rename = "Telefono",
        alias = "Teléfono",
        alias = "Phone",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    phone: Option<String>,
    #[serde(
        rename = "Cedula",
        alias = "Cédula",
        alias = "National ID",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    national_id: Option<String>,
    #[serde(
        rename = "Tipo",
        alias = "Type",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    kind_hint: Option<String>,
}

impl From<ContactRow> for ImportedContact {
    fn from(row: ContactRow) -> Self {
        ImportedContact {
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            national_id: row.national_id,
            kind_hint: row.kind_hint,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
