//! Table DDL and the index variants the index programs compare.

pub const CREATE_BLOCKSET_TABLE: &str =
    "CREATE TABLE Blockset(ID INTEGER PRIMARY KEY, Length INTEGER NOT NULL);";
pub const CREATE_BLOCKSETENTRY_TABLE: &str =
    "CREATE TABLE BlocksetEntry(BlocksetID INTEGER NOT NULL, BlockID INTEGER NOT NULL);";
/// Block keyed by a text hash.
pub const CREATE_BLOCK_TABLE: &str =
    "CREATE TABLE Block (ID INTEGER PRIMARY KEY, Hash TEXT NOT NULL, Size INTEGER NOT NULL);";
/// Block keyed by a hash split over four integer columns.
pub const CREATE_SPLIT_BLOCK_TABLE: &str = "CREATE TABLE Block (ID INTEGER PRIMARY KEY, h0 INTEGER NOT NULL, h1 INTEGER NOT NULL, h2 INTEGER NOT NULL, h3 INTEGER NOT NULL, Size INTEGER NOT NULL);";
/// Block keyed by one blob holding the hash and the length.
pub const CREATE_BLOB_BLOCK_TABLE: &str =
    "CREATE TABLE Block (ID INTEGER PRIMARY KEY, HashLength BLOB NOT NULL) STRICT;";
/// Block keyed by an integer hash prefix plus a blob with the rest.
pub const CREATE_BLOB_INT_BLOCK_TABLE: &str = "CREATE TABLE Block (ID INTEGER PRIMARY KEY, FirstHash INTEGER NOT NULL, HashLength BLOB NOT NULL) STRICT;";

/// Blockset table of the parallel lookup program.
pub const CREATE_HASHED_BLOCKSET_TABLE: &str = "CREATE TABLE Blockset(ID INTEGER PRIMARY KEY, Length INTEGER NOT NULL, FullHash TEXT NOT NULL);";
pub const CREATE_HASHED_BLOCKSET_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS BlocksetLengthHash ON Blockset(Length, FullHash);";

pub const INSERT_BLOCK: &str = "INSERT INTO Block(ID, Hash, Size) VALUES (?, ?, ?);";
pub const INSERT_OR_IGNORE_BLOCK: &str =
    "INSERT OR IGNORE INTO Block (ID, Hash, Size) VALUES (?, ?, ?);";
pub const INSERT_BLOCKSET: &str = "INSERT INTO Blockset(ID, Length) VALUES (?, ?);";
pub const INSERT_BLOCKSET_ENTRY: &str =
    "INSERT INTO BlocksetEntry(BlocksetID, BlockID) VALUES (?, ?);";
/// Opens an empty blockset; the engine assigns the ID.
pub const INSERT_OPEN_BLOCKSET: &str = "INSERT INTO Blockset (Length) VALUES (0);";
pub const INSERT_BLOCK_AUTO_ID: &str = "INSERT INTO Block (Hash, Size) VALUES (?, ?);";
pub const UPDATE_BLOCKSET_LENGTH: &str = "UPDATE Blockset SET Length = Length + 1 WHERE ID = ?;";
pub const INSERT_SPLIT_BLOCK: &str =
    "INSERT INTO Block(ID, h0, h1, h2, h3, Size) VALUES (?, ?, ?, ?, ?, ?);";
pub const INSERT_BLOB_BLOCK: &str = "INSERT INTO Block(ID, HashLength) VALUES (?, ?);";
pub const INSERT_BLOB_INT_BLOCK: &str =
    "INSERT INTO Block(ID, FirstHash, HashLength) VALUES (?, ?, ?);";
pub const INSERT_HASHED_BLOCKSET: &str =
    "INSERT INTO Blockset(ID, Length, FullHash) VALUES (?, ?, ?);";

pub const SELECT_BLOCK_ID: &str = "SELECT ID FROM Block WHERE Hash = ? AND Size = ?;";
pub const SELECT_BLOCK_ID_PAREN: &str = "SELECT ID FROM Block WHERE (Hash = ? AND Size = ?);";
pub const SELECT_BLOCK_ALL: &str = "SELECT * FROM Block WHERE Hash = ? AND Size = ?;";
pub const SELECT_BLOCKSET_MEMBERS: &str = "SELECT Block.ID, Block.Hash, Block.Size FROM Block JOIN BlocksetEntry ON BlocksetEntry.BlockID = Block.ID WHERE BlocksetEntry.BlocksetID = ?;";
pub const SELECT_HASHED_BLOCKSET_ID: &str =
    "SELECT ID FROM Blockset WHERE Length = ? AND FullHash = ?;";

/// Indexes created by the pragma program before filling.
pub const PRAGMA_PROGRAM_INDEXES: [&str; 3] = [
    "CREATE INDEX BlockHashSize ON Block(Hash, Size);",
    "CREATE INDEX BlocksetEntryBlocksetID ON BlocksetEntry(BlocksetID);",
    "CREATE INDEX BlocksetBlocksetID ON Blockset(ID);",
];

/// Tables shared by every single-connection program; `block` picks the
/// Block layout.
pub fn block_tables(block: &'static str) -> [&'static str; 3] {
    [CREATE_BLOCKSET_TABLE, CREATE_BLOCKSETENTRY_TABLE, block]
}

/// Key columns a text lookup binds, in parameter order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyColumn {
    Hash,
    Size,
}

/// Index variants over the text-hash Block table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextIndex {
    HashSize,
    Hash,
    Size,
}

impl TextIndex {
    pub const ALL: [TextIndex; 3] = [TextIndex::HashSize, TextIndex::Hash, TextIndex::Size];

    pub fn create_index(self) -> &'static str {
        match self {
            TextIndex::HashSize => "CREATE INDEX BlockHashSize ON Block(Hash, Size);",
            TextIndex::Hash => "CREATE INDEX BlockHash ON Block(Hash);",
            TextIndex::Size => "CREATE INDEX BlockSize ON Block(Size);",
        }
    }

    /// Every lookup returns `ID, Hash, Size`; rows are scanned until the
    /// full key matches.
    pub fn lookup(self) -> &'static str {
        match self {
            TextIndex::HashSize => "SELECT ID, Hash, Size FROM Block WHERE Hash = ? AND Size = ?;",
            TextIndex::Hash => "SELECT ID, Hash, Size FROM Block WHERE Hash = ?;",
            TextIndex::Size => "SELECT ID, Hash, Size FROM Block WHERE Size = ?;",
        }
    }

    pub fn bound(self) -> &'static [KeyColumn] {
        match self {
            TextIndex::HashSize => &[KeyColumn::Hash, KeyColumn::Size],
            TextIndex::Hash => &[KeyColumn::Hash],
            TextIndex::Size => &[KeyColumn::Size],
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            TextIndex::HashSize => "normal",
            TextIndex::Hash => "hash",
            TextIndex::Size => "size",
        }
    }
}

/// Index variants over the split-hash Block table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitIndex {
    Normal,
    H0,
    H0Size,
    Size,
}

impl SplitIndex {
    pub const ALL: [SplitIndex; 4] = [
        SplitIndex::Normal,
        SplitIndex::H0,
        SplitIndex::H0Size,
        SplitIndex::Size,
    ];

    pub fn create_index(self) -> &'static str {
        match self {
            SplitIndex::Normal => "CREATE INDEX BlockHashSize ON Block(h0, h1, h2, h3, Size);",
            SplitIndex::H0 => "CREATE INDEX BlockH0 ON Block(h0);",
            SplitIndex::H0Size => "CREATE INDEX BlockH0 ON Block(h0, Size);",
            SplitIndex::Size => "CREATE INDEX BlockSize ON Block(Size);",
        }
    }

    /// Every lookup returns `ID, h0, h1, h2, h3, Size` so the row can be
    /// compared against the full key regardless of what was bound.
    pub fn lookup(self) -> &'static str {
        match self {
            SplitIndex::Normal => {
                "SELECT ID, h0, h1, h2, h3, Size FROM Block WHERE h0 = ? AND h1 = ? AND h2 = ? AND h3 = ? AND Size = ?;"
            }
            SplitIndex::H0 => "SELECT ID, h0, h1, h2, h3, Size FROM Block WHERE h0 = ?;",
            SplitIndex::H0Size => {
                "SELECT ID, h0, h1, h2, h3, Size FROM Block WHERE h0 = ? AND Size = ?;"
            }
            SplitIndex::Size => "SELECT ID, h0, h1, h2, h3, Size FROM Block WHERE Size = ?;",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            SplitIndex::Normal => "normal",
            SplitIndex::H0 => "h0",
            SplitIndex::H0Size => "h0_size",
            SplitIndex::Size => "size",
        }
    }
}

/// Blob-keyed layouts; each variant carries its own table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobIndex {
    /// Unique index on `(HashLength, ID)`, looked up by the whole blob.
    Blob,
    /// Unique index on `(FirstHash, HashLength)`, looked up by the prefix
    /// only; rows are scanned until the blob matches.
    BlobInt,
}

impl BlobIndex {
    pub const ALL: [BlobIndex; 2] = [BlobIndex::Blob, BlobIndex::BlobInt];

    pub fn create_table(self) -> &'static str {
        match self {
            BlobIndex::Blob => CREATE_BLOB_BLOCK_TABLE,
            BlobIndex::BlobInt => CREATE_BLOB_INT_BLOCK_TABLE,
        }
    }

    pub fn insert(self) -> &'static str {
        match self {
            BlobIndex::Blob => INSERT_BLOB_BLOCK,
            BlobIndex::BlobInt => INSERT_BLOB_INT_BLOCK,
        }
    }

    pub fn create_index(self) -> &'static str {
        match self {
            BlobIndex::Blob => "CREATE UNIQUE INDEX BlockHashLength ON Block(HashLength, ID);",
            BlobIndex::BlobInt => {
                "CREATE UNIQUE INDEX BlockFirstHashLength ON Block(FirstHash, HashLength);"
            }
        }
    }

    /// Returns `ID, HashLength`.
    pub fn lookup(self) -> &'static str {
        match self {
            BlobIndex::Blob => "SELECT ID, HashLength FROM Block WHERE HashLength = ?;",
            BlobIndex::BlobInt => "SELECT ID, HashLength FROM Block WHERE FirstHash = ?;",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            BlobIndex::Blob => "blob",
            BlobIndex::BlobInt => "blob_int",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::open_in_memory;

    #[test]
    fn test_all_tables_and_indexes_create() {
        let conn = open_in_memory(&block_tables(CREATE_BLOCK_TABLE)).unwrap();
        for index in PRAGMA_PROGRAM_INDEXES {
            conn.execute_batch(index).unwrap();
        }
        for statement in [
            INSERT_BLOCK,
            INSERT_OR_IGNORE_BLOCK,
            INSERT_BLOCK_AUTO_ID,
            INSERT_BLOCKSET,
            INSERT_OPEN_BLOCKSET,
            INSERT_BLOCKSET_ENTRY,
            UPDATE_BLOCKSET_LENGTH,
            SELECT_BLOCK_ID,
            SELECT_BLOCK_ID_PAREN,
            SELECT_BLOCK_ALL,
            SELECT_BLOCKSET_MEMBERS,
        ] {
            conn.prepare(statement).unwrap();
        }
    }

    #[test]
    fn test_text_index_statements_prepare() {
        for index in TextIndex::ALL {
            let conn = open_in_memory(&block_tables(CREATE_BLOCK_TABLE)).unwrap();
            conn.execute_batch(index.create_index()).unwrap();
            let stmt = conn.prepare(index.lookup()).unwrap();
            assert_eq!(stmt.parameter_count(), index.bound().len());
        }
    }

    #[test]
    fn test_split_index_statements_prepare() {
        for index in SplitIndex::ALL {
            let conn = open_in_memory(&block_tables(CREATE_SPLIT_BLOCK_TABLE)).unwrap();
            conn.execute_batch(index.create_index()).unwrap();
            let stmt = conn.prepare(index.lookup()).unwrap();
            assert_eq!(stmt.column_count(), 6);
        }
    }

    #[test]
    fn test_blob_index_statements_prepare() {
        for index in BlobIndex::ALL {
            let conn = open_in_memory(&block_tables(index.create_table())).unwrap();
            conn.execute_batch(index.create_index()).unwrap();
            conn.prepare(index.insert()).unwrap();
            let stmt = conn.prepare(index.lookup()).unwrap();
            assert_eq!(stmt.column_count(), 2);
            assert_eq!(stmt.parameter_count(), 1);
        }
    }

    #[test]
    fn test_hashed_blockset_schema() {
        let conn = open_in_memory(&[CREATE_HASHED_BLOCKSET_TABLE, CREATE_HASHED_BLOCKSET_INDEX])
            .unwrap();
        conn.prepare(SELECT_HASHED_BLOCKSET_ID).unwrap();
        conn.prepare(INSERT_HASHED_BLOCKSET).unwrap();
    }
}
