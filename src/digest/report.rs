use crate::digest::pacing::{PaceGate, Pacer};
use crate::error::DigestError;
use crate::notion::client::{DocumentStore, ToggleBlock};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};

/// Hard content ceiling of a single rich-text block.
pub const MAX_SECTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub channel_name: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub page_id: String,
    pub title: String,
    pub sections: Vec<ReportSection>,
}

pub fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

pub fn report_title(date: NaiveDate) -> String {
    format!(
        "{}월 {}주차 업무 요약 ({})",
        date.month(),
        week_of_month(date),
        date.format("%Y-%m-%d")
    )
}

/// Char-based truncation; text within the limit comes back unchanged.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

pub fn section_header(channel_name: &str) -> String {
    format!("📂 {channel_name} 채널 요약")
}

pub struct ReportPublisher<'a> {
    store: &'a dyn DocumentStore,
    pacer: &'a dyn Pacer,
    parent_id: String,
    title_property: String,
}

impl<'a> ReportPublisher<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        pacer: &'a dyn Pacer,
        parent_id: &str,
        title_property: &str,
    ) -> Self {
        Self {
            store,
            pacer,
            parent_id: parent_id.to_string(),
            title_property: title_property.to_string(),
        }
    }

    pub fn create_report(&self, date: NaiveDate) -> Result<Report> {
        let title = report_title(date);
        let page_id = self
            .store
            .create_page(&self.parent_id, &self.title_property, &title)
            .map_err(|err| DigestError::ReportCreation(format!("{err:#}")))?;
        tracing::info!(page_id = %page_id, title = %title, "report page created");
        Ok(Report {
            page_id,
            title,
            sections: Vec::new(),
        })
    }

    pub fn append_section(&self, report: &mut Report, channel_name: &str, summary: &str) -> Result<()> {
        let body = truncate_chars(summary, MAX_SECTION_CHARS);
        let block = ToggleBlock {
            header: section_header(channel_name),
            body,
        };
        let result = self.store.append_block(&report.page_id, &block);
        self.pacer.pause(PaceGate::Append);
        result?;

        tracing::info!(page_id = %report.page_id, channel = %channel_name, "report section appended");
        report.sections.push(ReportSection {
            channel_name: channel_name.to_string(),
            body: block.body,
        });
        Ok(())
    }
}
