use helpdesk_kpi::{
    date_util, report, Category, Database, HelpDesk, NewComment, NewTicket, Priority, Status,
    TicketQuery, TicketUpdate,
};

fn ticket(title: &str, category: Category, priority: Priority, assignee: Option<&str>) -> NewTicket {
    NewTicket {
        title: title.into(),
        description: format!("{title} description"),
        reproduction_steps: String::new(),
        category,
        priority,
        created_by: "employee-1".into(),
        assigned_to: assignee.map(str::to_string),
        screenshots: vec![],
    }
}

#[tokio::test]
async fn test_ticket_lifecycle_feeds_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let hd = HelpDesk::new(Database::open_at(dir.path().join("helpdesk.db")).await.unwrap());

    let vpn = hd
        .create_ticket(ticket("VPN down", Category::Network, Priority::Critical, Some("tech-1")))
        .await
        .unwrap();
    let laptop = hd
        .create_ticket(ticket("Laptop fan", Category::Hardware, Priority::Low, Some("tech-1")))
        .await
        .unwrap();
    hd.create_ticket(ticket("IDE license", Category::Software, Priority::Medium, Some("dev-1")))
        .await
        .unwrap();

    hd.add_comment(
        &vpn.id,
        NewComment {
            user_id: "tech-1".into(),
            content: "Looking into it".into(),
        },
    )
    .await
    .unwrap();
    hd.resolve_ticket(&vpn.id, "Restarted the concentrator", Some("tech-1"))
        .await
        .unwrap();
    hd.update_ticket(
        &laptop.id,
        TicketUpdate {
            status: Some(Status::InProgress),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let now = date_util::now();
    let options = hd.metrics_options().await.unwrap();
    let m = hd.kpi_metrics(now, &options).await.unwrap();

    assert_eq!(m.total_tickets, 3);
    assert_eq!(m.open_tickets, 1);
    assert_eq!(m.in_progress_tickets, 1);
    assert_eq!(m.resolved_tickets, 1);
    assert_eq!(m.average_resolution_time, 0.0);
    assert_eq!(m.first_response_time, 0.0);
    // Creation may straddle a UTC week boundary, so derive the expectation
    let this_week = date_util::Window::week_containing(now, options.week_start);
    let stored = hd.list_tickets().await.unwrap();
    let expected = stored.iter().filter(|t| this_week.contains(t.created_at)).count() as u64;
    assert_eq!(m.ticket_trends.this_week, expected);
    assert_eq!(m.ticket_trends.this_week + m.ticket_trends.last_week, 3);
    assert_eq!(m.category_breakdown.network, 1);
    assert_eq!(m.priority_distribution.critical, 1);
    assert_eq!(m.sla_metrics.within_sla, 1);
    assert_eq!(m.sla_metrics.sla_compliance, 100.0);

    // The series ends today; totals hold even if the run crossed midnight
    let today = m.daily_ticket_volume.last().unwrap();
    assert_eq!(today.date, date_util::date_key(now));
    let created: u64 = m.daily_ticket_volume.iter().map(|d| d.created).sum();
    let resolved: u64 = m.daily_ticket_volume.iter().map(|d| d.resolved).sum();
    assert_eq!(created, 3);
    assert_eq!(resolved, 1);

    // Seeded support staff, in directory order
    let team: Vec<&str> = m.team_performance.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(team, vec!["admin-1", "tech-1", "dev-1"]);
    let tech = &m.team_performance[1];
    assert_eq!(tech.assigned_tickets, 2);
    assert_eq!(tech.resolved_tickets, 1);
    assert_eq!(tech.resolution_rate, 50.0);

    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["slaMetrics"]["withinSLA"], 1);
    assert_eq!(json["totalTickets"], 3);

    let text = report::ticket_report(&hd.get_ticket(&vpn.id).await.unwrap().unwrap());
    assert!(text.contains("Restarted the concentrator"));
    assert!(text.contains("## Comments (1)"));
}

#[tokio::test]
async fn test_role_scoped_listing() {
    let hd = HelpDesk::new(Database::open_memory().await.unwrap());
    hd.create_ticket(ticket("Router", Category::Network, Priority::High, None))
        .await
        .unwrap();
    hd.create_ticket(ticket("Phishing mail", Category::Security, Priority::High, None))
        .await
        .unwrap();
    hd.create_ticket(ticket("Chair", Category::Other, Priority::Low, Some("tech-1")))
        .await
        .unwrap();

    let tech = hd.get_user("tech-1").await.unwrap().unwrap();
    let titles: Vec<String> = TicketQuery::new()
        .visible_to(&tech)
        .oldest_first()
        .tickets(hd.db())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["Router", "Chair"]);

    let dev = hd.get_user("dev-1").await.unwrap().unwrap();
    let n = TicketQuery::new().visible_to(&dev).count(hd.db()).await.unwrap();
    assert_eq!(n, 1);

    let found = TicketQuery::new()
        .search("PHISHING")
        .tickets(hd.db())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let source = HelpDesk::new(Database::open_memory().await.unwrap());
    let t = source
        .create_ticket(ticket("Monitor flicker", Category::Hardware, Priority::Medium, None))
        .await
        .unwrap();
    source
        .add_comment(
            &t.id,
            NewComment {
                user_id: "tech-1".into(),
                content: "Swap the cable".into(),
            },
        )
        .await
        .unwrap();
    let exported = source.export_tickets().await.unwrap();

    let target = HelpDesk::new(Database::open_memory().await.unwrap());
    let tickets = serde_json::from_str(&exported).unwrap();
    assert_eq!(target.import_tickets(tickets).await.unwrap(), 1);
    // Importing again replaces rather than duplicates
    let tickets = serde_json::from_str(&exported).unwrap();
    target.import_tickets(tickets).await.unwrap();

    assert_eq!(
        target.list_tickets().await.unwrap(),
        source.list_tickets().await.unwrap()
    );
}

#[tokio::test]
async fn test_import_files_comments_under_their_ticket() {
    let hd = HelpDesk::new(Database::open_memory().await.unwrap());
    let mut doc = serde_json::json!([{
        "id": "ticket-a",
        "title": "Printer jam",
        "category": "hardware",
        "priority": "low",
        "status": "open",
        "createdBy": "employee-1",
        "createdByName": "John Employee",
        "createdAt": "2024-03-04T09:00:00.000Z",
        "updatedAt": "2024-03-04T09:00:00.000Z",
        "comments": [{
            "id": "comment-1",
            "ticketId": "ticket-zzz",
            "userId": "tech-1",
            "userName": "Sarah Tech",
            "content": "Cleared the tray",
            "createdAt": "2024-03-04T10:00:00.000Z"
        }]
    }]);

    let tickets = serde_json::from_value(doc.clone()).unwrap();
    assert_eq!(hd.import_tickets(tickets).await.unwrap(), 1);
    let stored = hd.get_ticket("ticket-a").await.unwrap().unwrap();
    assert_eq!(stored.comments.len(), 1);
    assert_eq!(stored.comments[0].ticket_id, "ticket-a");

    // Re-importing without the comment replaces the thread
    doc[0]["comments"] = serde_json::json!([]);
    let tickets = serde_json::from_value(doc).unwrap();
    hd.import_tickets(tickets).await.unwrap();
    let stored = hd.get_ticket("ticket-a").await.unwrap().unwrap();
    assert!(stored.comments.is_empty());
}
