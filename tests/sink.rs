mod common;

use common::{contents, FlakyTarget};
use p2000::parse::HarvestRecord;
use p2000::sink::{TsvSink, TSV_HEADER};
use p2000::stats::parse_tsv;
use p2000::Error;
use pretty_assertions::assert_eq;

fn record(n: usize) -> HarvestRecord {
    HarvestRecord {
        timestamp: format!("0{n}-01-2026 12:00:00"),
        service: "Politie".into(),
        region: "Haaglanden".into(),
        message: format!("P {n} verkeersongeval met letsel"),
    }
}

#[tokio::test]
async fn failed_page_leaves_no_partial_row() {
    let header = format!("{TSV_HEADER}\n");
    let first_page = "01-01-2026 12:00:00\tPolitie\tHaaglanden\tP 1 verkeersongeval met letsel\n";
    // Room for the header, the first page and half of the second one.
    let (target, data) = FlakyTarget::new(header.len() + first_page.len() + 40);

    let mut sink = TsvSink::with_target("memory.tsv", target).await.unwrap();
    sink.append_page(&[record(1)]).await.unwrap();
    let err = sink.append_page(&[record(2), record(3)]).await.unwrap_err();

    assert!(matches!(err, Error::Sink { persisted: 1, .. }));
    assert_eq!(sink.persisted(), 1);
    let written = contents(&data);
    assert_eq!(written, format!("{header}{first_page}"));
    assert_eq!(parse_tsv(&written).unwrap().len(), 1);
}

#[tokio::test]
async fn header_failure_leaves_nothing_behind() {
    let (target, data) = FlakyTarget::new(10);

    let err = TsvSink::with_target("memory.tsv", target).await.unwrap_err();

    assert_eq!(err.persisted(), Some(0));
    assert_eq!(contents(&data), "");
}
