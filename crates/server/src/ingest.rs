//! Minimal plain-text manuscript splitter.
//!
//! Full PDF/ePUB/TXT parsing is an external collaborator per §6; this is
//! only enough structure to exercise the HTTP upload endpoint against a
//! plain-text manuscript: lines starting with `# ` open a new chapter, and
//! paragraphs within a chapter are separated by blank lines.

use narrata_core::Chapter;

pub fn split_manuscript(book_id: &str, text: &str) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_paragraphs: Vec<String> = Vec::new();
    let mut paragraph_buf = String::new();

    let flush_paragraph = |buf: &mut String, paragraphs: &mut Vec<String>| {
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            paragraphs.push(trimmed.to_string());
        }
        buf.clear();
    };

    let flush_chapter = |title: &mut Option<String>, paragraphs: &mut Vec<String>, chapters: &mut Vec<Chapter>| {
        if !paragraphs.is_empty() {
            let index = chapters.len();
            let toc_path = title.clone().map(|t| vec![t]).unwrap_or_default();
            chapters.push(Chapter::new(format!("ch{:04}", index + 1), book_id, index, toc_path, std::mem::take(paragraphs)));
        }
        *title = None;
    };

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("# ") {
            flush_paragraph(&mut paragraph_buf, &mut current_paragraphs);
            flush_chapter(&mut current_title, &mut current_paragraphs, &mut chapters);
            current_title = Some(heading.trim().to_string());
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph(&mut paragraph_buf, &mut current_paragraphs);
        } else {
            if !paragraph_buf.is_empty() {
                paragraph_buf.push(' ');
            }
            paragraph_buf.push_str(line.trim());
        }
    }
    flush_paragraph(&mut paragraph_buf, &mut current_paragraphs);
    flush_chapter(&mut current_title, &mut current_paragraphs, &mut chapters);

    chapters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_headings_and_blank_lines() {
        let text = "# Chapter One\nHello there.\n\nA second paragraph.\n\n# Chapter Two\nMore text.\n";
        let chapters = split_manuscript("b1", text);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].toc_path, vec!["Chapter One".to_string()]);
        assert_eq!(chapters[0].paragraphs, vec!["Hello there.".to_string(), "A second paragraph.".to_string()]);
        assert_eq!(chapters[1].paragraphs, vec!["More text.".to_string()]);
    }

    #[test]
    fn manuscript_with_no_headings_is_a_single_chapter() {
        let chapters = split_manuscript("b1", "Just one paragraph.\n");
        assert_eq!(chapters.len(), 1);
        assert!(chapters[0].toc_path.is_empty());
    }

    #[test]
    fn blank_manuscript_yields_no_chapters() {
        let chapters = split_manuscript("b1", "\n\n   \n");
        assert!(chapters.is_empty());
    }
}
