//! Built-in preference table of the support application.
//!
//! Keys are stable across releases: a renamed key is a new key with a fresh
//! default. [`definitions`] returns the table for a build flavor; [`keys`]
//! holds typed handles for every entry.

use crate::definition::KeyDefinition;

/// Default of the extension value keys; renders as a placeholder row.
pub const EXTENSION_PLACEHOLDER: &str = "KeyPlaceholder";

/// Distribution channel of the build. Only changes the `HideQuit` default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogFlavor {
    /// Directly distributed build: Quit is hidden by default.
    #[default]
    Direct,
    /// App Store build: Quit must stay visible.
    AppStore,
}

macro_rules! typed_keys {
    ($($handle:ident: $ty:ty => $key:literal;)*) => {
        $(pub const $handle: TypedKey<$ty> = TypedKey::new($key);)*

        #[cfg(test)]
        pub(crate) const ALL: &[(&str, ValueType)] =
            &[$(($key, <$ty as FromValue>::VALUE_TYPE)),*];
    };
}

/// Typed handles for every catalog key.
pub mod keys {
    use crate::definition::TypedKey;
    #[cfg(test)]
    use crate::value::{FromValue, ValueType};

    typed_keys! {
        // General
        TITLE: String => "Title";
        CUSTOM_COLOR: String => "CustomColor";
        CUSTOM_COLOR_DARK_MODE: String => "CustomColorDarkMode";
        ERROR_MESSAGE: String => "ErrorMessage";
        SHOW_WELCOME_SCREEN: bool => "ShowWelcomeScreen";
        HIDE_QUIT: bool => "HideQuit";
        FOOTER_TEXT: String => "FooterText";
        OPEN_AT_LOGIN: bool => "OpenAtLogin";

        // Info items
        INFO_ITEM_ONE: String => "InfoItemOne";
        INFO_ITEM_TWO: String => "InfoItemTwo";
        INFO_ITEM_THREE: String => "InfoItemThree";
        INFO_ITEM_FOUR: String => "InfoItemFour";
        INFO_ITEM_FIVE: String => "InfoItemFive";
        INFO_ITEM_SIX: String => "InfoItemSix";
        UPTIME_DAYS_LIMIT: i64 => "UptimeDaysLimit";
        PASSWORD_EXPIRY_LIMIT: i64 => "PasswordExpiryLimit";
        PASSWORD_LABEL: String => "PasswordLabel";
        PASSWORD_TYPE: String => "PasswordType";
        KERBEROS_REALM: String => "KerberosRealm";
        STORAGE_LIMIT: i64 => "StorageLimit";

        // Extensions
        EXTENSION_TITLE_A: String => "ExtensionTitleA";
        EXTENSION_SYMBOL_A: String => "ExtensionSymbolA";
        EXTENSION_TYPE_A: String => "ExtensionTypeA";
        EXTENSION_LINK_A: String => "ExtensionLinkA";
        EXTENSION_TITLE_B: String => "ExtensionTitleB";
        EXTENSION_SYMBOL_B: String => "ExtensionSymbolB";
        EXTENSION_TYPE_B: String => "ExtensionTypeB";
        EXTENSION_LINK_B: String => "ExtensionLinkB";

        // First row of buttons
        FIRST_ROW_TITLE_LEFT: String => "FirstRowTitleLeft";
        FIRST_ROW_SUBTITLE_LEFT: String => "FirstRowSubtitleLeft";
        FIRST_ROW_TYPE_LEFT: String => "FirstRowTypeLeft";
        FIRST_ROW_LINK_LEFT: String => "FirstRowLinkLeft";
        FIRST_ROW_SYMBOL_LEFT: String => "FirstRowSymbolLeft";
        FIRST_ROW_TITLE_MIDDLE: String => "FirstRowTitleMiddle";
        FIRST_ROW_SUBTITLE_MIDDLE: String => "FirstRowSubtitleMiddle";
        FIRST_ROW_TYPE_MIDDLE: String => "FirstRowTypeMiddle";
        FIRST_ROW_LINK_MIDDLE: String => "FirstRowLinkMiddle";
        FIRST_ROW_SYMBOL_MIDDLE: String => "FirstRowSymbolMiddle";
        FIRST_ROW_TITLE_RIGHT: String => "FirstRowTitleRight";
        FIRST_ROW_SUBTITLE_RIGHT: String => "FirstRowSubtitleRight";
        FIRST_ROW_TYPE_RIGHT: String => "FirstRowTypeRight";
        FIRST_ROW_LINK_RIGHT: String => "FirstRowLinkRight";
        FIRST_ROW_SYMBOL_RIGHT: String => "FirstRowSymbolRight";

        // Second row of buttons
        SECOND_ROW_TITLE_LEFT: String => "SecondRowTitleLeft";
        SECOND_ROW_SUBTITLE_LEFT: String => "SecondRowSubtitleLeft";
        SECOND_ROW_TYPE_LEFT: String => "SecondRowTypeLeft";
        SECOND_ROW_LINK_LEFT: String => "SecondRowLinkLeft";
        SECOND_ROW_SYMBOL_LEFT: String => "SecondRowSymbolLeft";
        SECOND_ROW_TITLE_MIDDLE: String => "SecondRowTitleMiddle";
        SECOND_ROW_SUBTITLE_MIDDLE: String => "SecondRowSubtitleMiddle";
        SECOND_ROW_TYPE_MIDDLE: String => "SecondRowTypeMiddle";
        SECOND_ROW_LINK_MIDDLE: String => "SecondRowLinkMiddle";
        SECOND_ROW_SYMBOL_MIDDLE: String => "SecondRowSymbolMiddle";
        SECOND_ROW_TITLE_RIGHT: String => "SecondRowTitleRight";
        SECOND_ROW_SUBTITLE_RIGHT: String => "SecondRowSubtitleRight";
        SECOND_ROW_TYPE_RIGHT: String => "SecondRowTypeRight";
        SECOND_ROW_LINK_RIGHT: String => "SecondRowLinkRight";
        SECOND_ROW_SYMBOL_RIGHT: String => "SecondRowSymbolRight";

        // Local only
        HAS_SEEN_WELCOME_SCREEN: bool => "HasSeenWelcomeScreen";
        EXTENSION_VALUE_A: String => "ExtensionValueA";
        EXTENSION_VALUE_B: String => "ExtensionValueB";
    }
}

/// The full preference table for `flavor`, in display order.
pub fn definitions(flavor: CatalogFlavor) -> Vec<KeyDefinition> {
    use keys::*;

    let s = |key: crate::TypedKey<String>, default: &'static str| KeyDefinition::string(key.key(), default);
    let b = |key: crate::TypedKey<bool>, default: bool| KeyDefinition::bool(key.key(), default);
    let i = |key: crate::TypedKey<i64>, default: i64| KeyDefinition::int(key.key(), default);

    vec![
        s(TITLE, "Support").summary("title shown at the top of the window"),
        s(CUSTOM_COLOR, "").summary("accent color for all symbols"),
        s(CUSTOM_COLOR_DARK_MODE, "").summary("accent color in dark mode"),
        s(ERROR_MESSAGE, "Please contact IT support"),
        b(SHOW_WELCOME_SCREEN, false),
        b(HIDE_QUIT, flavor == CatalogFlavor::Direct),
        s(FOOTER_TEXT, "").summary("footnote at the bottom of the window"),
        b(OPEN_AT_LOGIN, false),
        s(INFO_ITEM_ONE, "ComputerName"),
        s(INFO_ITEM_TWO, "MacOSVersion"),
        s(INFO_ITEM_THREE, "Uptime"),
        s(INFO_ITEM_FOUR, "Storage"),
        s(INFO_ITEM_FIVE, ""),
        s(INFO_ITEM_SIX, ""),
        i(UPTIME_DAYS_LIMIT, 0).summary("days of uptime before a badge is shown; 0 disables"),
        i(PASSWORD_EXPIRY_LIMIT, 0).summary("days before password expiry to show a badge; 0 disables"),
        s(PASSWORD_LABEL, "Mac Password"),
        s(PASSWORD_TYPE, "Apple"),
        s(KERBEROS_REALM, ""),
        i(STORAGE_LIMIT, 0).summary("storage usage percentage that shows a badge; 0 disables"),
        s(EXTENSION_TITLE_A, ""),
        s(EXTENSION_SYMBOL_A, ""),
        s(EXTENSION_TYPE_A, "App"),
        s(EXTENSION_LINK_A, ""),
        s(EXTENSION_TITLE_B, ""),
        s(EXTENSION_SYMBOL_B, ""),
        s(EXTENSION_TYPE_B, "App"),
        s(EXTENSION_LINK_B, ""),
        s(FIRST_ROW_TITLE_LEFT, "Remote Support"),
        s(FIRST_ROW_SUBTITLE_LEFT, ""),
        s(FIRST_ROW_TYPE_LEFT, "App"),
        s(FIRST_ROW_LINK_LEFT, "com.apple.ScreenSharing"),
        s(FIRST_ROW_SYMBOL_LEFT, "cursorarrow"),
        s(FIRST_ROW_TITLE_MIDDLE, ""),
        s(FIRST_ROW_SUBTITLE_MIDDLE, ""),
        s(FIRST_ROW_TYPE_MIDDLE, "URL"),
        s(FIRST_ROW_LINK_MIDDLE, ""),
        s(FIRST_ROW_SYMBOL_MIDDLE, ""),
        s(FIRST_ROW_TITLE_RIGHT, "Company Store"),
        s(FIRST_ROW_SUBTITLE_RIGHT, ""),
        s(FIRST_ROW_TYPE_RIGHT, "App"),
        s(FIRST_ROW_LINK_RIGHT, "com.apple.AppStore"),
        s(FIRST_ROW_SYMBOL_RIGHT, "cart.fill"),
        s(SECOND_ROW_TITLE_LEFT, "Support Ticket"),
        s(SECOND_ROW_SUBTITLE_LEFT, ""),
        s(SECOND_ROW_TYPE_LEFT, "URL"),
        s(SECOND_ROW_LINK_LEFT, "https://yourticketsystem.tld"),
        s(SECOND_ROW_SYMBOL_LEFT, "ticket"),
        s(SECOND_ROW_TITLE_MIDDLE, ""),
        s(SECOND_ROW_SUBTITLE_MIDDLE, ""),
        s(SECOND_ROW_TYPE_MIDDLE, "URL"),
        s(SECOND_ROW_LINK_MIDDLE, ""),
        s(SECOND_ROW_SYMBOL_MIDDLE, ""),
        s(SECOND_ROW_TITLE_RIGHT, "Phone"),
        s(SECOND_ROW_SUBTITLE_RIGHT, ""),
        s(SECOND_ROW_TYPE_RIGHT, "URL"),
        s(SECOND_ROW_LINK_RIGHT, "tel:+31000000000"),
        s(SECOND_ROW_SYMBOL_RIGHT, "phone"),
        b(HAS_SEEN_WELCOME_SCREEN, false).local_only(),
        s(EXTENSION_VALUE_A, EXTENSION_PLACEHOLDER).local_only(),
        s(EXTENSION_VALUE_B, EXTENSION_PLACEHOLDER).local_only(),
    ]
}
