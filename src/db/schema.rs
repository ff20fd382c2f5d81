pub const SCHEMA: &str = r#"
-- Drafts: persona records under construction
CREATE TABLE IF NOT EXISTS drafts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    gender TEXT,                        -- 'male' / 'female', NULL until chosen
    title TEXT,                         -- persona name, NULL until submitted
    status TEXT NOT NULL DEFAULT 'draft', -- 'draft' or 'final'
    created_at TEXT NOT NULL,
    finalized_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_drafts_owner ON drafts(owner_id);

-- Committed photos owned by a draft
CREATE TABLE IF NOT EXISTS draft_photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    draft_id INTEGER NOT NULL,
    content_hash TEXT NOT NULL,         -- SHA256 of the raw bytes
    storage_key TEXT NOT NULL,          -- Blob store key
    created_at TEXT NOT NULL,
    UNIQUE (draft_id, content_hash),
    FOREIGN KEY (draft_id) REFERENCES drafts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_draft_photos_draft ON draft_photos(draft_id);
CREATE INDEX IF NOT EXISTS idx_draft_photos_storage_key ON draft_photos(storage_key);

-- Photos received before the user had a draft
CREATE TABLE IF NOT EXISTS overflow_photos (
    seq INTEGER PRIMARY KEY AUTOINCREMENT, -- Arrival order
    user_id INTEGER NOT NULL,
    source_ref TEXT NOT NULL,
    payload BLOB NOT NULL,
    group_id TEXT,
    arrived_at TEXT NOT NULL            -- RFC3339, fixed precision so it sorts as text
);

CREATE INDEX IF NOT EXISTS idx_overflow_user ON overflow_photos(user_id);
CREATE INDEX IF NOT EXISTS idx_overflow_arrived ON overflow_photos(arrived_at);
"#;

