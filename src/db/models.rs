/// Outcome of one dbcheck round-trip against the `hello` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloRecord {
    pub inserted_id: i32,
    pub rows_in_hello: i64,
}
