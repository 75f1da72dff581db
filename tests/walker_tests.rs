//! Integration tests: real `.eml` files through the MIME layer and the walker.

use std::path::{Path, PathBuf};

use mimewalk::export::AttachmentExporter;
use mimewalk::model::Flags;
use mimewalk::parser::mime::parse_message_file;
use mimewalk::walker::{Event, EventLog, MessageWalker, PartAddress, WalkOutcome};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn walk(name: &str) -> EventLog {
    let message = parse_message_file(fixture(name)).unwrap();
    let mut log = EventLog::new();
    let outcome = MessageWalker::default().parse(&message, &mut log).unwrap();
    assert_eq!(outcome, WalkOutcome::Completed);
    log
}

fn body_ids(log: &EventLog) -> Vec<&str> {
    log.body_events().filter_map(Event::id).collect()
}

// ─── Envelope ───────────────────────────────────────────────────────

#[test]
fn test_envelope_fields() {
    let log = walk("simple.eml");
    let events = log.events();

    assert!(events.contains(&Event::From {
        addresses: vec!["a@x".to_string()]
    }));
    assert!(events.contains(&Event::Subject {
        subject: "café".to_string()
    }));
    let flags = events.iter().find_map(|e| match e {
        Event::SystemFlags { flags } => Some(*flags),
        _ => None,
    });
    assert!(flags.is_some_and(|f| f.contains(Flags::SEEN)));

    let to = events.iter().find_map(|e| match e {
        Event::To { addresses } => Some(addresses.clone()),
        _ => None,
    });
    assert_eq!(
        to.unwrap(),
        vec!["Bob <bob@example.org>", "carol@example.org"]
    );
}

#[test]
fn test_envelope_precedes_body() {
    let log = walk("simple.eml");
    let events = log.events();
    let first_body = events.iter().position(Event::is_body).unwrap();
    assert!(first_body > 0);
    assert!(events[first_body..]
        .iter()
        .all(|e| e.is_body() || *e == Event::MessageEnd));
    assert_eq!(events.last(), Some(&Event::MessageEnd));
}

#[test]
fn test_plain_text_is_delivered_verbatim() {
    let log = walk("simple.eml");
    let texts: Vec<_> = log
        .body_events()
        .filter_map(|e| match e {
            Event::InlineText { id, text, .. } => Some((id.as_str(), text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].0, "1");
    assert!(texts[0].1.starts_with("Line one.\nLine two."));
}

// ─── Structure and addressing ───────────────────────────────────────

#[test]
fn test_multipart_structure() {
    let log = walk("multipart.eml");
    assert_eq!(
        body_ids(&log),
        vec!["", "1", "1.1", "1.2", "2", "3", "4", "5"]
    );

    let kinds: Vec<_> = log.body_events().map(Event::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "multipart",
            "multipart",
            "inline_text",
            "inline_html",
            "attachment",
            "image",
            "special_part",
            "nested_message",
        ]
    );

    match log.body_events().next() {
        Some(Event::Multipart { count, content_type, .. }) => {
            assert_eq!(*count, 5);
            assert_eq!(content_type, "multipart/mixed");
        }
        other => panic!("expected root multipart, got {other:?}"),
    };
}

#[test]
fn test_addresses_strictly_increase() {
    let log = walk("multipart.eml");
    let addresses: Vec<PartAddress> = body_ids(&log)
        .into_iter()
        .map(|id| PartAddress::parse(id).unwrap())
        .collect();
    assert!(addresses.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_attachment_and_image_details() {
    let log = walk("multipart.eml");
    let attachment = log.body_events().find_map(|e| match e {
        Event::Attachment {
            file_name, inline, ..
        } => Some((file_name.clone(), *inline)),
        _ => None,
    });
    assert_eq!(attachment, Some((Some("report.pdf".to_string()), false)));

    let cid = log.body_events().find_map(|e| match e {
        Event::Image { content_id, .. } => content_id.clone(),
        _ => None,
    });
    assert!(cid.unwrap().contains("logo@example.com"));
}

#[test]
fn test_nested_message_walked_below_its_address() {
    let message = parse_message_file(fixture("multipart.eml")).unwrap();
    let walker = MessageWalker::default();
    let mut log = EventLog::new().keep_nested();
    walker.parse(&message, &mut log).unwrap();

    assert!(log.events().contains(&Event::NestedMessage {
        id: "5".to_string(),
        subject: Some("Forwarded note".to_string()),
    }));
    let mut nested = log.take_nested();
    assert_eq!(nested.len(), 1);
    let (id, part) = nested.remove(0);

    let mut inner = EventLog::new();
    walker.parse_with_prefix(&part, &id, &mut inner).unwrap();
    assert!(inner.events().contains(&Event::Subject {
        subject: "Forwarded note".to_string()
    }));
    assert_eq!(body_ids(&inner), vec!["5.1"]);
}

#[test]
fn test_stop_after_body_events() {
    let message = parse_message_file(fixture("multipart.eml")).unwrap();
    let mut log = EventLog::new().stop_after(3);
    let outcome = MessageWalker::default().parse(&message, &mut log).unwrap();
    assert_eq!(outcome, WalkOutcome::Stopped);
    assert_eq!(log.body_events().count(), 3);
    assert_eq!(log.events().last(), Some(&Event::MessageEnd));
}

#[test]
fn test_walk_is_repeatable() {
    let message = parse_message_file(fixture("multipart.eml")).unwrap();
    let walker = MessageWalker::default();
    let mut first = EventLog::new();
    let mut second = EventLog::new();
    walker.parse(&message, &mut first).unwrap();
    walker.parse(&message, &mut second).unwrap();
    assert_eq!(first.events(), second.events());
}

// ─── Legacy encodings ───────────────────────────────────────────────

#[test]
fn test_uuencoded_text_is_split() {
    let log = walk("uuencoded.eml");
    let body: Vec<_> = log.body_events().collect();
    assert_eq!(body.len(), 2);

    match body[0] {
        Event::InlineText { id, text, .. } => {
            assert_eq!(id, "1");
            assert!(text.contains("Here is the file"));
            assert!(text.contains("Regards"));
            assert!(!text.contains("begin 644"));
        }
        other => panic!("expected inline text, got {other:?}"),
    }
    match body[1] {
        Event::InlineUuAttachment { id, file_name, size } => {
            assert_eq!(id, "2");
            assert_eq!(file_name.as_deref(), Some("hello.txt"));
            assert_eq!(*size, Some(28));
        }
        other => panic!("expected UU attachment, got {other:?}"),
    }
}

#[test]
fn test_tnef_container_is_expanded() {
    let log = walk("tnef.eml");
    assert_eq!(body_ids(&log), vec!["", "1", "2", "3"]);

    let texts: Vec<_> = log
        .body_events()
        .filter_map(|e| match e {
            Event::InlineText { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Numbers attached."));

    match log.body_events().last() {
        Some(Event::Attachment {
            id,
            content_type,
            file_name,
            size,
            ..
        }) => {
            assert_eq!(id, "3");
            assert_eq!(content_type, "text/csv");
            assert_eq!(file_name.as_deref(), Some("numbers.csv"));
            assert_eq!(*size, Some(20));
        }
        other => panic!("expected TNEF attachment, got {other:?}"),
    }
}

#[test]
fn test_truncated_tnef_is_reported_once_as_attachment() {
    let log = walk("tnef_truncated.eml");
    assert_eq!(body_ids(&log), vec!["", "1", "2"]);
    let attachments: Vec<_> = log
        .body_events()
        .filter(|e| matches!(e, Event::Attachment { .. }))
        .collect();
    assert_eq!(attachments.len(), 1);
    assert!(matches!(
        attachments[0],
        Event::Attachment { file_name: Some(name), .. } if name == "winmail.dat"
    ));
}

// ─── Export ─────────────────────────────────────────────────────────

#[test]
fn test_extract_writes_every_file() {
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    let dir = assert_fs::TempDir::new().unwrap();
    let message = parse_message_file(fixture("multipart.eml")).unwrap();
    let mut exporter = AttachmentExporter::new(dir.path());
    MessageWalker::default().parse(&message, &mut exporter).unwrap();

    assert!(exporter.failures().is_empty());
    dir.child("report.pdf").assert(predicate::path::is_file());
    dir.child("logo.png").assert(predicate::path::is_file());
    dir.child("part_4.ics").assert(predicate::path::is_file());
    dir.child("part_5.eml")
        .assert(predicate::str::contains("Subject: Forwarded note"));
    assert_eq!(exporter.written().len(), 4);
}

#[test]
fn test_extract_tnef_attachment() {
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    let dir = assert_fs::TempDir::new().unwrap();
    let message = parse_message_file(fixture("tnef.eml")).unwrap();
    let mut exporter = AttachmentExporter::new(dir.path());
    MessageWalker::default().parse(&message, &mut exporter).unwrap();

    dir.child("numbers.csv")
        .assert(predicate::str::contains("1,100"));
    dir.child("winmail.dat").assert(predicate::path::missing());
}
