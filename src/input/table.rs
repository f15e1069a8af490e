use crate::errors::{EngineError, EngineResult};
use crate::state::RawContract;
use csv::{ReaderBuilder, StringRecord};

pub const COL_UNDERLYING: &str = "ACAO CODIGO";
pub const COL_OPTION: &str = "OPCAO";
pub const COL_SPOT: &str = "VALOR AÇÃO";
pub const COL_STRIKE: &str = "STRIKE R$";
pub const COL_EXPIRY: &str = "VECTO";
pub const COL_TYPE: &str = "TIPO";
/// Optional. Derived from spot and strike when absent.
pub const COL_DISTANCE: &str = "DISTANCIA  % STRIKE";

pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_UNDERLYING,
    COL_OPTION,
    COL_SPOT,
    COL_STRIKE,
    COL_EXPIRY,
    COL_TYPE,
];

/// Raw option chain as read from a delimited export.
#[derive(Debug, Clone)]
pub struct OptionTable {
    pub delimiter: u8,
    pub has_distance_column: bool,
    pub rows: Vec<RawContract>,
}

impl OptionTable {
    /// Decode bytes (UTF-8, falling back to Latin-1) and parse.
    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        Self::from_text(&decode_text(bytes))
    }

    /// Parse a comma- or semicolon-delimited table with a header row.
    /// Fails only on structural problems: missing columns or broken quoting.
    pub fn from_text(text: &str) -> EngineResult<Self> {
        let delimiter = detect_delimiter(text)?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        let columns = ColumnMap::resolve(&headers)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(columns.extract(&record));
        }

        tracing::debug!(
            delimiter = %char::from(delimiter),
            rows = rows.len(),
            has_distance = columns.distance.is_some(),
            "option table parsed"
        );

        Ok(Self {
            delimiter,
            has_distance_column: columns.distance.is_some(),
            rows,
        })
    }
}

/// Comma first; a single-column header means the export used semicolons.
fn detect_delimiter(text: &str) -> EngineResult<u8> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_reader(text.as_bytes());
    if reader.headers()?.len() > 1 {
        return Ok(b',');
    }
    Ok(b';')
}

/// Strips a UTF-8 BOM. Invalid UTF-8 is read as Latin-1, byte for byte.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("input is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Header positions of the columns we read.
struct ColumnMap {
    underlying: usize,
    option: usize,
    spot: usize,
    strike: usize,
    expiry: usize,
    kind: usize,
    distance: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> EngineResult<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut positions = [0usize; REQUIRED_COLUMNS.len()];
        let mut missing = Vec::new();
        for (slot, name) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            match position(name) {
                Some(idx) => *slot = idx,
                None => missing.push(name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(EngineError::MissingColumns {
                missing,
                expected: REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect(),
            });
        }

        let [underlying, option, spot, strike, expiry, kind] = positions;
        Ok(Self {
            underlying,
            option,
            spot,
            strike,
            expiry,
            kind,
            distance: position(COL_DISTANCE),
        })
    }

    fn extract(&self, record: &StringRecord) -> RawContract {
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        RawContract {
            underlying_symbol: cell(self.underlying),
            option_code: cell(self.option),
            spot: cell(self.spot),
            strike: cell(self.strike),
            distance_pct: self.distance.map(cell),
            type_tag: cell(self.kind),
            expiry_tag: cell(self.expiry),
        }
    }
}
