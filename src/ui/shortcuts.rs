//! Keyboard shortcut labels shared by the help overlay and footer.

pub const HELP: &str = "F1";
pub const THEME: &str = "F2";
pub const SCOPE_NEXT: &str = "F3";
pub const SCOPE_PREV: &str = "Shift+F3";
pub const WHOLE_WORD: &str = "F4";
pub const DATE_FROM: &str = "F5";
pub const DATE_TO: &str = "F6";
pub const SEARCH_ALL: &str = "F7";
pub const SENDER_COLORS: &str = "F8";
pub const KEYWORD_LIST: &str = "F9";
pub const QUIT: &str = "Esc/F10";
pub const CLEAR_FILTERS: &str = "Ctrl+L";
pub const RELOAD: &str = "Ctrl+R";
pub const FOCUS_SEARCH: &str = "/";

// Annotation
pub const TAG: &str = "t";
pub const UNTAG: &str = "u";
pub const QUICK_TAGS: &str = "1/2/3";
pub const NOTE: &str = "n";

// Navigation
pub const JUMP_TOP: &str = "Home";
pub const JUMP_BOTTOM: &str = "End";
pub const PAGE: &str = "PgUp/PgDn";
