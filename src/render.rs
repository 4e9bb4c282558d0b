//! Markdown to storage-format markup
//!
//! Pure transformation from raw markdown to the remote store's XHTML
//! storage representation. Local image references are collected as
//! attachment uploads; relative links to other markdown documents are
//! rewritten through the map of already-synced remote links.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::RenderError;

/// Rendered document body plus local files to upload as attachments
#[derive(Debug, Clone, Default)]
pub struct Rendered {
	pub markup: String,
	pub attachments: Vec<PathBuf>,
}

/// Body for directory documents: a children listing sorted by title
pub fn directory_markup() -> String {
	concat!(
		"<p><ac:structured-macro ac:name=\"children\" ac:schema-version=\"2\">",
		"<ac:parameter ac:name=\"all\">true</ac:parameter>",
		"<ac:parameter ac:name=\"sort\">title</ac:parameter>",
		"</ac:structured-macro></p>"
	)
	.to_string()
}

fn heading_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap())
}

fn image_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r#"!\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).unwrap())
}

fn link_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r#"\[([^\]]+)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).unwrap())
}

fn code_span_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

fn bold_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap())
}

fn emphasis_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").unwrap())
}

fn list_item_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+(.*)$").unwrap())
}

fn ordered_item_re() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^\s*\d+\.\s+(.*)$").unwrap())
}

/// Render one markdown document.
///
/// `links` maps local source paths of already-synced documents to their
/// remote URLs; relative links into the tree resolve through it, links
/// that cannot be resolved yet are left untouched.
pub fn render(
	path: &Path,
	raw: &str,
	links: &BTreeMap<String, String>,
	hard_wraps: bool,
) -> Result<Rendered, RenderError> {
	let mut out = String::new();
	let mut attachments = Vec::new();
	let doc_dir = path.parent().unwrap_or_else(|| Path::new("."));

	let mut lines = raw.lines().peekable();

	// YAML front matter carries no body content
	if lines.peek().map(|l| l.trim() == "---").unwrap_or(false) {
		lines.next();
		for line in lines.by_ref() {
			if line.trim() == "---" {
				break;
			}
		}
	}

	let mut paragraph: Vec<String> = Vec::new();
	let mut list_kind: Option<&str> = None;

	macro_rules! flush_paragraph {
		() => {
			if !paragraph.is_empty() {
				let joined = if hard_wraps {
					paragraph.join("<br />")
				} else {
					paragraph.join(" ")
				};
				out.push_str("<p>");
				out.push_str(&joined);
				out.push_str("</p>");
				paragraph.clear();
			}
		};
	}

	macro_rules! close_list {
		() => {
			if let Some(kind) = list_kind.take() {
				out.push_str(&format!("</{}>", kind));
			}
		};
	}

	while let Some(line) = lines.next() {
		// Fenced code becomes the code macro with a CDATA body
		if let Some(rest) = line.trim_start().strip_prefix("```") {
			flush_paragraph!();
			close_list!();
			let language = rest.trim();
			let mut body = String::new();
			for code_line in lines.by_ref() {
				if code_line.trim_start().starts_with("```") {
					break;
				}
				body.push_str(code_line);
				body.push('\n');
			}
			out.push_str("<ac:structured-macro ac:name=\"code\" ac:schema-version=\"1\">");
			out.push_str("<ac:parameter ac:name=\"theme\">Confluence</ac:parameter>");
			out.push_str("<ac:parameter ac:name=\"linenumbers\">true</ac:parameter>");
			if !language.is_empty() {
				out.push_str(&format!(
					"<ac:parameter ac:name=\"language\">{}</ac:parameter>",
					language
				));
			}
			out.push_str("<ac:plain-text-body><![CDATA[ ");
			out.push_str(&body.replace("]]>", "]]]]><![CDATA[>"));
			out.push_str(" ]]></ac:plain-text-body></ac:structured-macro>");
			continue;
		}

		if line.trim().is_empty() {
			flush_paragraph!();
			close_list!();
			continue;
		}

		if let Some(caps) = heading_re().captures(line) {
			flush_paragraph!();
			close_list!();
			let level = caps[1].len();
			let text = inline(&caps[2], doc_dir, links, &mut attachments);
			out.push_str(&format!("<h{}>{}</h{}>", level, text, level));
			continue;
		}

		if let Some(caps) = list_item_re().captures(line) {
			flush_paragraph!();
			if list_kind != Some("ul") {
				close_list!();
				out.push_str("<ul>");
				list_kind = Some("ul");
			}
			let text = inline(&caps[1], doc_dir, links, &mut attachments);
			out.push_str(&format!("<li>{}</li>", text));
			continue;
		}

		if let Some(caps) = ordered_item_re().captures(line) {
			flush_paragraph!();
			if list_kind != Some("ol") {
				close_list!();
				out.push_str("<ol>");
				list_kind = Some("ol");
			}
			let text = inline(&caps[1], doc_dir, links, &mut attachments);
			out.push_str(&format!("<li>{}</li>", text));
			continue;
		}

		close_list!();
		paragraph.push(inline(line.trim(), doc_dir, links, &mut attachments));
	}

	flush_paragraph!();
	close_list!();

	Ok(Rendered { markup: out, attachments })
}

/// Inline markup for one line: escape, then images, links, code spans,
/// bold and emphasis
fn inline(
	text: &str,
	doc_dir: &Path,
	links: &BTreeMap<String, String>,
	attachments: &mut Vec<PathBuf>,
) -> String {
	let escaped = escape(text);

	let with_images = image_re()
		.replace_all(&escaped, |caps: &regex::Captures| {
			let alt = &caps[1];
			let dest = &caps[2];
			match local_file(doc_dir, dest) {
				Some(local) => {
					let filename = local
						.file_name()
						.map(|n| n.to_string_lossy().into_owned())
						.unwrap_or_default();
					attachments.push(local);
					format!("<ac:image><ri:attachment ri:filename=\"{}\"/></ac:image>", filename)
				}
				None => format!("<img src=\"{}\" alt=\"{}\" />", dest, alt),
			}
		})
		.into_owned();

	let with_links = link_re()
		.replace_all(&with_images, |caps: &regex::Captures| {
			let text = &caps[1];
			let dest = &caps[2];
			format!("<a href=\"{}\">{}</a>", resolve_link(doc_dir, dest, links), text)
		})
		.into_owned();

	let with_code = code_span_re().replace_all(&with_links, "<code>$1</code>").into_owned();
	let with_bold = bold_re().replace_all(&with_code, "<strong>$1</strong>").into_owned();
	emphasis_re().replace_all(&with_bold, "<em>$1</em>").into_owned()
}

/// Rewrite a relative markdown link through the synced-link map; absolute
/// URLs and unresolvable targets pass through unchanged
fn resolve_link(doc_dir: &Path, dest: &str, links: &BTreeMap<String, String>) -> String {
	if is_url(dest) {
		return dest.to_string();
	}

	let (path_part, fragment) = match dest.split_once('#') {
		Some((p, f)) => (p, Some(f)),
		None => (dest, None),
	};
	if path_part.is_empty() {
		return dest.to_string();
	}

	let resolved = normalize(&doc_dir.join(path_part));
	let resolved_text = resolved.to_string_lossy();

	for (local, url) in links {
		if path_suffix_match(&resolved_text, local) {
			return match fragment {
				Some(f) => format!("{}#{}", url, f),
				None => url.clone(),
			};
		}
	}
	dest.to_string()
}

/// Lexical path normalization: drops "." and resolves ".." so relative
/// links compare against the link map's keys
fn normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for comp in path.components() {
		match comp {
			std::path::Component::CurDir => {}
			std::path::Component::ParentDir => {
				out.pop();
			}
			other => out.push(other),
		}
	}
	out
}

/// Equality up to a leading prefix. The shorter path must match the
/// longer one starting at a "/" component boundary, so "other.md" never
/// resolves through an entry for "another.md".
fn path_suffix_match(a: &str, b: &str) -> bool {
	if a == b {
		return true;
	}
	a.ends_with(&format!("/{}", b)) || b.ends_with(&format!("/{}", a))
}

/// A non-URL destination that exists on disk, resolved against the
/// document's directory
fn local_file(doc_dir: &Path, dest: &str) -> Option<PathBuf> {
	if is_url(dest) {
		return None;
	}
	let direct = PathBuf::from(dest);
	if direct.is_file() {
		return Some(direct);
	}
	let relative = doc_dir.join(dest);
	if relative.is_file() {
		return Some(relative);
	}
	None
}

fn is_url(dest: &str) -> bool {
	dest.starts_with("http://")
		|| dest.starts_with("https://")
		|| dest.starts_with("mailto:")
		|| dest.starts_with("ftp://")
}

fn escape(text: &str) -> String {
	text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}


// vim: ts=4
