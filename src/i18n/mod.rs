//! Internationalization (i18n) module.
//!
//! Provides localized strings for the CLI and for the few user-visible
//! strings the renderer emits (loading placeholder, attachment labels).
//! English is the default language; Spanish is available as an alternative.

use std::sync::OnceLock;

static CURRENT_LANG: OnceLock<Lang> = OnceLock::new();

/// Supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    /// English (default)
    En,
    /// Spanish
    Es,
}

impl Lang {
    /// Parse a language code string (e.g. "en", "es", "en_US", "es_ES").
    /// Returns `None` for unrecognized codes.
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.to_lowercase();
        let prefix = normalized.split(['_', '-']).next().unwrap_or("");
        match prefix {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            _ => None,
        }
    }

    /// Return the ISO 639-1 code for this language.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }
}

/// Initialize the global language. Call once at startup.
/// If already initialized, this is a no-op.
pub fn set_lang(lang: Lang) {
    let _ = CURRENT_LANG.set(lang);
}

/// Get the currently configured language (defaults to English).
pub fn lang() -> Lang {
    CURRENT_LANG.get().copied().unwrap_or(Lang::En)
}

/// Detect language from `MAILFRAME_LANG`, then `LC_MESSAGES` / `LANG`.
pub fn detect_system_lang() -> Lang {
    std::env::var("MAILFRAME_LANG")
        .ok()
        .and_then(|v| Lang::from_code(&v))
        .or_else(|| {
            std::env::var("LC_MESSAGES")
                .ok()
                .and_then(|v| Lang::from_code(&v))
        })
        .or_else(|| std::env::var("LANG").ok().and_then(|v| Lang::from_code(&v)))
        .unwrap_or(Lang::En)
}

/// Macro for defining translatable message functions.
/// Each function returns a `&'static str` based on the current language.
macro_rules! msg {
    ($name:ident, $en:expr, $es:expr) => {
        /// Returns a localized string for the current language.
        pub fn $name() -> &'static str {
            match lang() {
                Lang::En => $en,
                Lang::Es => $es,
            }
        }
    };
}

// ── General ──────────────────────────────────────────────────────

msg!(
    app_about,
    "mailframe \u{2014} Render third-party HTML email bodies as themed, sanitized, standalone documents.",
    "mailframe \u{2014} Renderiza cuerpos de correo HTML de terceros como documentos independientes, saneados y con tema."
);
msg!(
    app_long_about,
    "mailframe \u{2014} Render third-party HTML email bodies.\nClassifies newsletter-style layouts, strips inline cid images,\nsanitizes the markup and wraps it in a light or dark themed document.",
    "mailframe \u{2014} Renderiza cuerpos de correo HTML de terceros.\nClasifica maquetaciones tipo newsletter, elimina im\u{e1}genes cid en l\u{ed}nea,\nsanea el marcado y lo envuelve en un documento con tema claro u oscuro."
);
msg!(
    app_after_help,
    "Examples:\n  mailframe render message.eml -o message.html\n  mailframe classify newsletter.html --json\n  mailframe batch ./inbox -o ./rendered",
    "Ejemplos:\n  mailframe render mensaje.eml -o mensaje.html\n  mailframe classify newsletter.html --json\n  mailframe batch ./bandeja -o ./renderizados"
);

// ── CLI help strings ─────────────────────────────────────────────

msg!(
    help_cmd_render,
    "Render an email (.eml, .html or .txt) as a themed standalone document",
    "Renderizar un correo (.eml, .html o .txt) como documento independiente con tema"
);
msg!(
    help_cmd_classify,
    "Show the layout classification score of an email body",
    "Mostrar la puntuaci\u{f3}n de clasificaci\u{f3}n de maquetaci\u{f3}n de un correo"
);
msg!(
    help_cmd_strip,
    "Print the HTML body with inline attachment images removed",
    "Imprimir el cuerpo HTML sin las im\u{e1}genes adjuntas en l\u{ed}nea"
);
msg!(
    help_cmd_batch,
    "Render every .eml file in a directory",
    "Renderizar todos los ficheros .eml de un directorio"
);
msg!(
    help_cmd_completions,
    "Generate shell completions",
    "Generar autocompletado para la shell"
);
msg!(
    help_cmd_manpage,
    "Generate a man page",
    "Generar p\u{e1}gina de manual"
);
msg!(
    help_cmd_init,
    "Write the default configuration file",
    "Escribir el fichero de configuraci\u{f3}n por defecto"
);

// ── Renderer ─────────────────────────────────────────────────────

msg!(
    msg_loading_large_email,
    "Loading large email",
    "Cargando email grande"
);
msg!(msg_default_attachment_name, "file", "archivo");
msg!(msg_rendering, "Rendering", "Renderizando");
msg!(msg_rendered, "Rendered", "Renderizados");
msg!(msg_failed, "failed", "fallidos");

// ── Classification report ────────────────────────────────────────

msg!(label_score, "Score", "Puntuaci\u{f3}n");
msg!(label_structured, "Structured", "Estructurado");
msg!(label_prefer_white, "White background", "Fondo blanco");
msg!(label_forced_plain, "Forced plain", "Forzado a texto");
msg!(label_tables, "Tables", "Tablas");
msg!(label_styles, "style= attributes", "Atributos style=");
msg!(label_signals, "Signals", "Se\u{f1}ales");

// ── Errors ───────────────────────────────────────────────────────

msg!(err_file_not_found, "File not found", "Fichero no encontrado");
msg!(
    err_not_a_directory,
    "Not a directory",
    "No es un directorio"
);

/// Loading placeholder text shown while a large email is mounted,
/// e.g. "Loading large email (52KB)...".
pub fn loading_placeholder(bytes: usize) -> String {
    format!("{} ({}KB)...", msg_loading_large_email(), bytes.div_ceil(1024))
}
