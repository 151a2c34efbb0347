//! CSV object body to `{"s3_object_data": [...]}` text.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::DataReadError};

/// One CSV record keyed by header, in header order.
pub type Row = Map<String, Value>;

/// Rows decoded from the target object.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ObjectPayload {
	/// Records in file order.
	#[serde(rename = "s3_object_data")]
	pub rows: Vec<Row>,
}
impl ObjectPayload {
	/// Decodes a UTF-8 CSV body with a header row.
	///
	/// Records must have as many fields as the header. A repeated header keeps its first position
	/// and takes the value of its last column.
	pub fn from_csv_bytes(bytes: Vec<u8>) -> Result<Self, DataReadError> {
		let text = String::from_utf8(bytes)?;
		let mut reader = csv::ReaderBuilder::new()
			.has_headers(true)
			.flexible(false)
			.from_reader(text.as_bytes());
		let headers = reader.headers()?.clone();
		let mut rows = Vec::new();

		for record in reader.records() {
			let record = record?;
			let row = headers
				.iter()
				.zip(record.iter())
				.map(|(column, cell)| (column.to_owned(), Value::String(cell.to_owned())))
				.collect::<Row>();

			rows.push(row);
		}

		Ok(Self { rows })
	}

	/// Serializes the rows as two-space indented JSON.
	pub fn to_text(&self) -> Result<String, DataReadError> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	/// Returns `true` when the object had no data rows.
	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rows_keep_header_order() {
		let payload = ObjectPayload::from_csv_bytes(b"id,name\n1,Alice\n2,Bob\n".to_vec())
			.expect("Well-formed CSV should decode.");
		let value = serde_json::to_value(&payload).expect("Payload should serialize.");

		assert_eq!(
			value,
			serde_json::json!({
				"s3_object_data": [
					{ "id": "1", "name": "Alice" },
					{ "id": "2", "name": "Bob" }
				]
			})
		);
		assert_eq!(payload.rows[0].keys().collect::<Vec<_>>(), ["id", "name"]);
	}

	#[test]
	fn reversed_headers_stay_reversed() {
		let payload = ObjectPayload::from_csv_bytes(b"name,id\nAlice,1\n".to_vec())
			.expect("Well-formed CSV should decode.");

		assert_eq!(payload.rows[0].keys().collect::<Vec<_>>(), ["name", "id"]);
	}

	#[test]
	fn header_only_and_empty_bodies_yield_no_rows() {
		for body in [&b"id,name\n"[..], &b""[..]] {
			let payload =
				ObjectPayload::from_csv_bytes(body.to_vec()).expect("Row-less bodies should decode.");

			assert!(payload.is_empty());
			assert_eq!(
				payload.to_text().expect("Empty payload should serialize."),
				"{\n  \"s3_object_data\": []\n}"
			);
		}
	}

	#[test]
	fn text_is_indented_json() {
		let text = ObjectPayload::from_csv_bytes(b"id\n7\n".to_vec())
			.expect("Single-column CSV should decode.")
			.to_text()
			.expect("Payload should serialize.");

		assert_eq!(text, "{\n  \"s3_object_data\": [\n    {\n      \"id\": \"7\"\n    }\n  ]\n}");
	}

	#[test]
	fn non_ascii_cells_are_written_as_utf8() {
		let text = ObjectPayload::from_csv_bytes("name\nZoë\n".as_bytes().to_vec())
			.expect("UTF-8 CSV should decode.")
			.to_text()
			.expect("Payload should serialize.");

		assert!(text.contains("\"Zoë\""));
	}

	#[test]
	fn quoted_cells_are_unescaped() {
		let payload =
			ObjectPayload::from_csv_bytes(b"id,name\n1,\"Smith, \"\"Al\"\"\"\n".to_vec())
				.expect("Quoted CSV should decode.");

		assert_eq!(payload.rows[0]["name"], Value::String("Smith, \"Al\"".into()));
	}

	#[test]
	fn ragged_rows_are_rejected() {
		let err = ObjectPayload::from_csv_bytes(b"id,name\n1,Alice,extra\n".to_vec())
			.expect_err("Records longer than the header must be rejected.");

		assert!(matches!(err, DataReadError::Csv(_)));
		assert!(ObjectPayload::from_csv_bytes(b"id,name\n1\n".to_vec()).is_err());
	}

	#[test]
	fn non_utf8_bodies_are_rejected() {
		let err = ObjectPayload::from_csv_bytes(vec![b'i', b'd', b'\n', 0xff, 0xfe])
			.expect_err("Invalid UTF-8 must be rejected.");

		assert!(matches!(err, DataReadError::Decode(_)));
	}

	#[test]
	fn duplicate_headers_keep_first_position_and_last_value() {
		let payload = ObjectPayload::from_csv_bytes(b"id,name,id\n1,Alice,2\n".to_vec())
			.expect("Duplicate headers should decode.");

		assert_eq!(payload.rows[0].keys().collect::<Vec<_>>(), ["id", "name"]);
		assert_eq!(payload.rows[0]["id"], Value::String("2".into()));
	}
}
