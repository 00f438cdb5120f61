mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use service::mailbox::{self, MailboxError, NewAttachment, NewMessage};

fn hello_message(recipients: &[&str]) -> NewMessage {
    NewMessage {
        subject: "Hi".to_string(),
        body: "Test".to_string(),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        attachments: vec![NewAttachment {
            filename: "note.txt".to_string(),
            content_type: "text/plain".to_string(),
            data_base64: STANDARD.encode(b"hello"),
        }],
    }
}

#[tokio::test]
async fn test_send_read_delete_scenario() {
    let state = common::state().await;
    common::register(&state, "alice@example.com").await;
    common::register(&state, "bob@example.com").await;

    let alice = common::session(&state, "alice@example.com").await;
    let sent = mailbox::send(&state, &alice, hello_message(&["Bob@Example.com"]))
        .await
        .unwrap();
    assert_eq!(sent.recipients, vec!["bob@example.com"]);
    assert_eq!(sent.attachments[0].size, 5);
    assert!(sent.verified);

    let bob = common::session(&state, "bob@example.com").await;
    let inbox = mailbox::inbox(&state, &bob).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, sent.id);
    assert_eq!(inbox[0].subject, "Hi");
    assert_eq!(inbox[0].sender_email, "alice@example.com");
    assert!(inbox[0].read_at.is_none());

    let detail = mailbox::message(&state, &bob, sent.id).await.unwrap();
    assert_eq!(detail.subject, "Hi");
    assert_eq!(detail.body, "Test");
    assert_eq!(detail.sender_email, "alice@example.com");
    assert_eq!(detail.recipients, vec!["bob@example.com"]);
    assert!(detail.verified);
    assert_eq!(detail.attachments.len(), 1);
    assert_eq!(detail.attachments[0].filename, "note.txt");
    assert_eq!(detail.attachments[0].content_type, "text/plain");
    assert_eq!(detail.attachments[0].size, 5);

    let content = mailbox::attachment(&state, &bob, detail.attachments[0].id)
        .await
        .unwrap();
    assert_eq!(content.filename, "note.txt");
    assert_eq!(content.data, b"hello");

    // the sender holds no grant on the message
    assert!(matches!(
        mailbox::message(&state, &alice, sent.id).await,
        Err(MailboxError::NotFound)
    ));

    let receipt = mailbox::mark_read(&state, &bob, sent.id).await.unwrap();
    assert_eq!(receipt.status, "read");
    let again = mailbox::mark_read(&state, &bob, sent.id).await.unwrap();
    assert_eq!(again.read_at, receipt.read_at);
    let inbox = mailbox::inbox(&state, &bob).await.unwrap();
    assert_eq!(inbox[0].read_at, Some(receipt.read_at));

    mailbox::delete(&state, &bob, sent.id).await.unwrap();
    assert!(matches!(
        mailbox::message(&state, &bob, sent.id).await,
        Err(MailboxError::NotFound)
    ));
    assert!(matches!(
        mailbox::attachment(&state, &bob, detail.attachments[0].id).await,
        Err(MailboxError::NotFound)
    ));
    assert!(matches!(
        mailbox::delete(&state, &bob, sent.id).await,
        Err(MailboxError::NotFound)
    ));
    assert!(matches!(
        mailbox::mark_read(&state, &bob, sent.id).await,
        Err(MailboxError::NotFound)
    ));
    assert!(mailbox::inbox(&state, &bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recipients_are_independent() {
    let state = common::state().await;
    for email in ["alice@example.com", "bob@example.com", "carol@example.com"] {
        common::register(&state, email).await;
    }
    let alice = common::session(&state, "alice@example.com").await;
    let bob = common::session(&state, "bob@example.com").await;
    let carol = common::session(&state, "carol@example.com").await;

    let first = mailbox::send(
        &state,
        &alice,
        hello_message(&["carol@example.com", "bob@example.com", "CAROL@example.com"]),
    )
    .await
    .unwrap();
    assert_eq!(
        first.recipients,
        vec!["carol@example.com", "bob@example.com"]
    );

    let mut second = hello_message(&["bob@example.com"]);
    second.subject = "Second".to_string();
    second.attachments.clear();
    let second = mailbox::send(&state, &alice, second).await.unwrap();

    // newest first
    let inbox = mailbox::inbox(&state, &bob).await.unwrap();
    let ids: Vec<_> = inbox.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    mailbox::delete(&state, &bob, first.id).await.unwrap();
    mailbox::mark_read(&state, &bob, second.id).await.unwrap();

    let detail = mailbox::message(&state, &carol, first.id).await.unwrap();
    assert_eq!(detail.recipients, vec!["carol@example.com", "bob@example.com"]);
    assert!(detail.read_at.is_none());
    assert!(detail.deleted_at.is_none());
    assert_eq!(mailbox::inbox(&state, &carol).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_send_validation() {
    let state = common::state().await;
    common::register(&state, "alice@example.com").await;
    let alice = common::session(&state, "alice@example.com").await;

    let result = mailbox::send(
        &state,
        &alice,
        hello_message(&["nobody@example.com", "alice@example.com", "ghost@example.com"]),
    )
    .await;
    match result {
        Err(MailboxError::RecipientsNotFound(missing)) => {
            assert_eq!(missing, vec!["nobody@example.com", "ghost@example.com"])
        }
        other => panic!("expected missing recipients, got {:?}", other),
    }

    let mut bad = hello_message(&["alice@example.com"]);
    bad.attachments[0].data_base64 = "***not base64***".to_string();
    match mailbox::send(&state, &alice, bad).await {
        Err(MailboxError::InvalidRequest(msg)) => assert_eq!(msg, "Invalid base64 for note.txt"),
        other => panic!("expected invalid request, got {:?}", other),
    }

    let mut empty_subject = hello_message(&["alice@example.com"]);
    empty_subject.subject = String::new();
    assert!(matches!(
        mailbox::send(&state, &alice, empty_subject).await,
        Err(MailboxError::InvalidRequest(_))
    ));

    assert!(matches!(
        mailbox::send(&state, &alice, hello_message(&[])).await,
        Err(MailboxError::InvalidRequest(_))
    ));

    // nothing was persisted by the failed sends
    assert!(mailbox::inbox(&state, &alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tampering_is_detected() {
    let state = common::state().await;
    common::register(&state, "alice@example.com").await;
    common::register(&state, "bob@example.com").await;
    let alice = common::session(&state, "alice@example.com").await;
    let bob = common::session(&state, "bob@example.com").await;

    let sent = mailbox::send(&state, &alice, hello_message(&["bob@example.com"]))
        .await
        .unwrap();

    // a forged signature still decrypts but is flagged
    sqlx::query("UPDATE messages SET signature = ?1 WHERE id = ?2")
        .bind(vec![7u8; 384])
        .bind(sent.id)
        .execute(&**state.database())
        .await
        .unwrap();
    let detail = mailbox::message(&state, &bob, sent.id).await.unwrap();
    assert_eq!(detail.body, "Test");
    assert!(!detail.verified);

    // altered ciphertext does not decrypt at all
    sqlx::query("UPDATE messages SET body_ciphertext = ?1 WHERE id = ?2")
        .bind(vec![0u8; 20])
        .bind(sent.id)
        .execute(&**state.database())
        .await
        .unwrap();
    let err = mailbox::message(&state, &bob, sent.id).await.unwrap_err();
    assert_eq!(err.client_message(), "Unable to open message");
}
