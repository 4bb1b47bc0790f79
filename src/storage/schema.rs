//! 建表语句。时间以 TEXT 存储（rusqlite 的 chrono 格式），布尔值为 0/1。

/// 当前数据库结构版本，写入 `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA_STATEMENTS: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT NOT NULL UNIQUE,
            email         TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL DEFAULT '',
            first_name    TEXT NOT NULL DEFAULT '',
            last_name     TEXT NOT NULL DEFAULT '',
            bio           TEXT NOT NULL DEFAULT '',
            avatar        TEXT,
            website       TEXT NOT NULL DEFAULT '',
            facebook      TEXT NOT NULL DEFAULT '',
            twitter       TEXT NOT NULL DEFAULT '',
            instagram     TEXT NOT NULL DEFAULT '',
            linkedin      TEXT NOT NULL DEFAULT '',
            is_active     INTEGER NOT NULL DEFAULT 1,
            is_staff      INTEGER NOT NULL DEFAULT 0,
            is_superuser  INTEGER NOT NULL DEFAULT 0,
            date_joined   TEXT NOT NULL,
            last_login    TEXT
        );
        "#,
    ),
    (
        "sessions",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token      TEXT PRIMARY KEY,
            user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "categories",
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            name             TEXT NOT NULL,
            slug             TEXT NOT NULL UNIQUE,
            description      TEXT NOT NULL DEFAULT '',
            featured_image   TEXT,
            parent_id        INTEGER REFERENCES categories(id) ON DELETE SET NULL,
            sort_order       INTEGER NOT NULL DEFAULT 0,
            meta_title       TEXT NOT NULL DEFAULT '',
            meta_description TEXT NOT NULL DEFAULT '',
            meta_keywords    TEXT NOT NULL DEFAULT '',
            canonical_url    TEXT NOT NULL DEFAULT '',
            og_title         TEXT NOT NULL DEFAULT '',
            og_description   TEXT NOT NULL DEFAULT '',
            og_image         TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        "#,
    ),
    (
        "page_templates",
        r#"
        CREATE TABLE IF NOT EXISTS page_templates (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            template    TEXT NOT NULL DEFAULT 'default',
            description TEXT NOT NULL DEFAULT ''
        );
        "#,
    ),
    (
        "tags",
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE
        );
        "#,
    ),
    (
        "pages",
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            title            TEXT NOT NULL,
            slug             TEXT NOT NULL UNIQUE,
            content          TEXT NOT NULL DEFAULT '',
            excerpt          TEXT NOT NULL DEFAULT '',
            featured_image   TEXT,
            template_id      INTEGER REFERENCES page_templates(id) ON DELETE SET NULL,
            parent_id        INTEGER REFERENCES pages(id) ON DELETE SET NULL,
            sort_order       INTEGER NOT NULL DEFAULT 0,
            is_homepage      INTEGER NOT NULL DEFAULT 0,
            status           TEXT NOT NULL DEFAULT 'draft',
            published_at     TEXT,
            meta_title       TEXT NOT NULL DEFAULT '',
            meta_description TEXT NOT NULL DEFAULT '',
            meta_keywords    TEXT NOT NULL DEFAULT '',
            canonical_url    TEXT NOT NULL DEFAULT '',
            og_title         TEXT NOT NULL DEFAULT '',
            og_description   TEXT NOT NULL DEFAULT '',
            og_image         TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
        CREATE TABLE IF NOT EXISTS page_tags (
            page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
            tag_id  INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (page_id, tag_id)
        );
        CREATE TABLE IF NOT EXISTS page_categories (
            page_id     INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY (page_id, category_id)
        );
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            title            TEXT NOT NULL,
            slug             TEXT NOT NULL UNIQUE,
            content          TEXT NOT NULL DEFAULT '',
            excerpt          TEXT NOT NULL DEFAULT '',
            featured_image   TEXT,
            author_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            is_featured      INTEGER NOT NULL DEFAULT 0,
            allow_comments   INTEGER NOT NULL DEFAULT 1,
            status           TEXT NOT NULL DEFAULT 'draft',
            published_at     TEXT,
            meta_title       TEXT NOT NULL DEFAULT '',
            meta_description TEXT NOT NULL DEFAULT '',
            meta_keywords    TEXT NOT NULL DEFAULT '',
            canonical_url    TEXT NOT NULL DEFAULT '',
            og_title         TEXT NOT NULL DEFAULT '',
            og_description   TEXT NOT NULL DEFAULT '',
            og_image         TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status, published_at);
        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
        CREATE TABLE IF NOT EXISTS post_tags (
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            tag_id  INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (post_id, tag_id)
        );
        CREATE TABLE IF NOT EXISTS post_categories (
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY (post_id, category_id)
        );
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL,
            object_id    INTEGER NOT NULL,
            author_id    INTEGER REFERENCES users(id) ON DELETE SET NULL,
            author_name  TEXT NOT NULL DEFAULT '',
            author_email TEXT NOT NULL DEFAULT '',
            author_url   TEXT NOT NULL DEFAULT '',
            content      TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending',
            parent_id    INTEGER REFERENCES comments(id) ON DELETE CASCADE,
            ip_address   TEXT,
            user_agent   TEXT NOT NULL DEFAULT '',
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_target ON comments(content_type, object_id);
        "#,
    ),
    (
        "menus",
        r#"
        CREATE TABLE IF NOT EXISTS menus (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            location    TEXT NOT NULL DEFAULT 'header',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS menu_items (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            menu_id      INTEGER NOT NULL REFERENCES menus(id) ON DELETE CASCADE,
            title        TEXT NOT NULL,
            item_type    TEXT NOT NULL DEFAULT 'custom',
            page_id      INTEGER REFERENCES pages(id) ON DELETE SET NULL,
            category_id  INTEGER REFERENCES categories(id) ON DELETE SET NULL,
            url          TEXT NOT NULL DEFAULT '',
            target_blank INTEGER NOT NULL DEFAULT 0,
            parent_id    INTEGER REFERENCES menu_items(id) ON DELETE CASCADE,
            sort_order   INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        "#,
    ),
    (
        "themes",
        r#"
        CREATE TABLE IF NOT EXISTS themes (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT NOT NULL,
            slug                TEXT NOT NULL UNIQUE,
            description         TEXT NOT NULL DEFAULT '',
            is_active           INTEGER NOT NULL DEFAULT 0,
            primary_color       TEXT NOT NULL DEFAULT '#3490dc',
            secondary_color     TEXT NOT NULL DEFAULT '#ffed4a',
            accent_color        TEXT NOT NULL DEFAULT '#f66d9b',
            font_family         TEXT NOT NULL DEFAULT '''Inter'', sans-serif',
            heading_font_family TEXT NOT NULL DEFAULT '',
            container_width     TEXT NOT NULL DEFAULT '1200px',
            custom_css          TEXT NOT NULL DEFAULT '',
            custom_js           TEXT NOT NULL DEFAULT '',
            logo                TEXT,
            favicon             TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );
        "#,
    ),
    (
        "widgets",
        r#"
        CREATE TABLE IF NOT EXISTS widget_areas (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS widgets (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            widget_type  TEXT NOT NULL DEFAULT 'text',
            area_id      INTEGER NOT NULL REFERENCES widget_areas(id) ON DELETE CASCADE,
            content      TEXT NOT NULL DEFAULT '',
            sort_order   INTEGER NOT NULL DEFAULT 0,
            is_active    INTEGER NOT NULL DEFAULT 1,
            content_type TEXT,
            object_id    INTEGER,
            settings     TEXT NOT NULL DEFAULT '{}',
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        "#,
    ),
    (
        "newsletter",
        r#"
        CREATE TABLE IF NOT EXISTS subscribers (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            email              TEXT NOT NULL UNIQUE,
            name               TEXT NOT NULL DEFAULT '',
            is_active          INTEGER NOT NULL DEFAULT 1,
            confirmation_token TEXT NOT NULL DEFAULT '',
            unsubscribe_token  TEXT NOT NULL DEFAULT '',
            confirmed_at       TEXT,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscribers_token ON subscribers(confirmation_token);
        CREATE TABLE IF NOT EXISTS newsletters (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            subject      TEXT NOT NULL,
            content      TEXT NOT NULL DEFAULT '',
            status       TEXT NOT NULL DEFAULT 'draft',
            scheduled_at TEXT,
            sent_at      TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        "#,
    ),
    (
        "media",
        r#"
        CREATE TABLE IF NOT EXISTS media_categories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS media_items (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            alt_text    TEXT NOT NULL DEFAULT '',
            file        TEXT NOT NULL,
            file_type   TEXT NOT NULL DEFAULT 'other',
            file_size   INTEGER NOT NULL DEFAULT 0,
            width       INTEGER,
            height      INTEGER,
            uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS media_item_categories (
            media_id    INTEGER NOT NULL REFERENCES media_items(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES media_categories(id) ON DELETE CASCADE,
            PRIMARY KEY (media_id, category_id)
        );
        "#,
    ),
];

/// `cms init` 写入的页面模板
pub const DEFAULT_PAGE_TEMPLATES: &[(&str, &str, &str)] = &[
    ("Default", "default", "default"),
    ("Full Width", "full-width", "full_width"),
    ("Sidebar", "sidebar", "sidebar"),
    ("Homepage", "homepage", "homepage"),
];

/// `cms init` 写入的小部件区域
pub const DEFAULT_WIDGET_AREAS: &[(&str, &str)] = &[("Sidebar", "sidebar"), ("Footer", "footer")];
