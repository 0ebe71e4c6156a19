use chrono::{TimeZone, Utc};
use peerconnect_common::{
    Connection, ConnectionId, ConnectionRequest, RecordStatus, RequestId, UserId, UserProfile,
};

pub fn profile(id: &str, first_name: &str, last_name: &str) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}.{}@example.edu", first_name.to_lowercase(), last_name.to_lowercase()),
        college_id: format!("ID{id}"),
        year: "Junior".to_string(),
        department: "Computer Science".to_string(),
        avatar: None,
        skills: vec![],
        interests: vec![],
        project_areas: vec![],
        bio: None,
        university: None,
        location: None,
        social_links: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap(),
        projects: None,
        experience: None,
    }
}

pub fn connection(id: &str, user_id1: &str, user_id2: &str) -> Connection {
    Connection {
        id: ConnectionId(id.to_string()),
        user_id1: UserId::from(user_id1),
        user_id2: UserId::from(user_id2),
        status: RecordStatus::Accepted,
        created_at: Utc::now(),
        message: None,
    }
}

pub fn request(id: &str, sender_id: &str, receiver_id: &str) -> ConnectionRequest {
    ConnectionRequest {
        id: RequestId(id.to_string()),
        sender_id: UserId::from(sender_id),
        receiver_id: UserId::from(receiver_id),
        message: None,
        status: RecordStatus::Pending,
        created_at: Utc::now(),
    }
}
