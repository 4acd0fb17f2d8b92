use modelcascade_core::db::{open_db, open_db_with_timeout};
use modelcascade_core::model::registry::{NewDataArea, NewDomain, NewSystem};
use modelcascade_core::{FamilySeed, ServiceContext};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_family_creations_on_separate_connections_all_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("families.db");

    let (domain_id, data_area_id, system_id) = {
        let conn = open_db(&path).unwrap();
        let ctx = ServiceContext::new(&conn);
        let domain = ctx
            .registry()
            .create_domain(&NewDomain {
                name: "Sales".to_string(),
                ..NewDomain::default()
            })
            .unwrap();
        let area = ctx
            .registry()
            .create_data_area(&NewDataArea {
                domain_id: domain.id,
                name: "Orders".to_string(),
                description: None,
                color_hex: None,
            })
            .unwrap();
        let system = ctx
            .registry()
            .create_system(&NewSystem::named("Data Lake"))
            .unwrap();
        (domain.id, area.id, system.id)
    };

    let workers = (0..4)
        .map(|index| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db_with_timeout(&path, Duration::from_secs(30)).unwrap();
                let ctx = ServiceContext::new(&conn);
                ctx.families()
                    .create_family(&FamilySeed {
                        name: format!("Family {index}"),
                        target_system_id: system_id,
                        domain_id,
                        data_area_id,
                        selected_object_ids: None,
                    })
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();

    let created = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect::<Vec<_>>();

    let conn = open_db(&path).unwrap();
    let ctx = ServiceContext::new(&conn);
    assert_eq!(ctx.registry().list_models(None).unwrap().len(), 12);
    for family in &created {
        let members = ctx.registry().list_family(family.conceptual.id).unwrap();
        assert_eq!(members.len(), 3);
        assert!(members
            .iter()
            .all(|model| model.family_root_id() == family.conceptual.id));
    }
}
