use chrono::NaiveDate;

use crate::ledger::{
    Course, Institution, LedgerState, ScheduledClass, Student, Teacher,
};

fn avatar(seed: &str) -> String {
    format!("https://picsum.photos/seed/{}/100/100", seed)
}

fn teacher(id: &str, institution: &str, name: &str, employee_id: &str, email: &str) -> Teacher {
    Teacher {
        id: id.into(),
        institution_id: institution.into(),
        name: name.into(),
        avatar_url: avatar(email.split('@').next().unwrap_or(email)),
        employee_id: employee_id.into(),
        email: email.into(),
        phone: None,
    }
}

fn course(id: &str, institution: &str, name: &str, teacher_ids: &[&str]) -> Course {
    Course {
        id: id.into(),
        institution_id: institution.into(),
        name: name.into(),
        teacher_ids: teacher_ids.iter().map(|t| t.to_string()).collect(),
    }
}

fn student(id: &str, institution: &str, name: &str, roll_no: &str, email: &str, courses: &[&str]) -> Student {
    Student {
        id: id.into(),
        institution_id: institution.into(),
        name: name.into(),
        avatar_url: avatar(email.split('@').next().unwrap_or(email)),
        roll_no: roll_no.into(),
        email: email.into(),
        phone: None,
        course_ids: courses.iter().map(|c| c.to_string()).collect(),
    }
}

fn class(
    id: &str,
    institution: &str,
    course_id: &str,
    subject: &str,
    time: &str,
    date: NaiveDate,
    is_free_period: bool,
) -> ScheduledClass {
    ScheduledClass {
        id: id.into(),
        institution_id: institution.into(),
        course_id: course_id.into(),
        subject: subject.into(),
        time: time.into(),
        date,
        is_free_period,
        is_locked: false,
    }
}

/// The demo dataset a fresh (or unrecoverable) workspace starts from. The
/// schedule lands on the given campus-calendar day.
pub fn demo_state(today: NaiveDate) -> LedgerState {
    let institutions = vec![
        Institution {
            id: "mit".into(),
            name: "Massachusetts Institute of Technology".into(),
        },
        Institution {
            id: "stanford".into(),
            name: "Stanford University".into(),
        },
        Institution {
            id: "default".into(),
            name: "Presentify Demo".into(),
        },
    ];

    let teachers = vec![
        teacher("t-mit-1", "mit", "Prof. Eleanor Vance", "MIT-EV1", "evance@mit.edu"),
        teacher("t-mit-2", "mit", "Dr. Robert Chen", "MIT-RC2", "rchen@mit.edu"),
        teacher("t-stan-1", "stanford", "Dr. Anya Sharma", "STAN-AS1", "asharma@stanford.edu"),
        teacher("t-stan-2", "stanford", "Prof. Ben Carter", "STAN-BC2", "bcarter@stanford.edu"),
        teacher("t-def-1", "default", "Kaushtav Mondal", "DEF-KM1", "teacher@example.com"),
    ];

    let courses = vec![
        course("c-mit-1", "mit", "Intro to Quantum Computing", &["t-mit-1"]),
        course("c-mit-2", "mit", "AI Ethics and Governance", &["t-mit-2"]),
        course("c-stan-1", "stanford", "Human-Computer Interaction", &["t-stan-1"]),
        course("c-stan-2", "stanford", "Startup Engineering", &["t-stan-2"]),
        course("c-def-1", "default", "Quantum Physics", &["t-def-1"]),
        course("c-def-2", "default", "Advanced Algorithms", &["t-def-1"]),
        course("c-def-3", "default", "Machine Learning", &["t-def-1"]),
        course("c-def-4", "default", "Project Work", &["t-def-1"]),
    ];

    let all_default = ["c-def-1", "c-def-2", "c-def-3", "c-def-4"];
    let students = vec![
        student("s-mit-1", "mit", "Alice Johnson", "MIT001", "alice@mit.edu", &["c-mit-1", "c-mit-2"]),
        student("s-mit-2", "mit", "Bob Williams", "MIT002", "bob@mit.edu", &["c-mit-1"]),
        student("s-stan-1", "stanford", "Charlie Brown", "STAN001", "charlie@stanford.edu", &["c-stan-1"]),
        student("s-stan-2", "stanford", "Diana Prince", "STAN002", "diana@stanford.edu", &["c-stan-1", "c-stan-2"]),
        student("s-def-1", "default", "Kaushtav Mondal", "DEF001", "kmondal@example.com", &all_default),
        student("s-def-2", "default", "Arnish Chattapadhay", "DEF002", "arnishc@example.com", &all_default),
        student("s-def-3", "default", "Debojyoti Mondal", "DEF003", "dmondal@example.com", &all_default),
        student("s-def-4", "default", "Chandan Ghosh", "DEF004", "chandang@example.com", &all_default),
        student("s-def-5", "default", "Sayan Betal", "DEF005", "sayanb@example.com", &all_default),
        student("s-def-6", "default", "Akraprava Chanda", "DEF006", "achanda@example.com", &all_default),
    ];

    let scheduled_classes = vec![
        class("sc-def-1", "default", "c-def-1", "Quantum Physics", "09:00 - 10:30", today, false),
        class("sc-def-2", "default", "c-def-2", "Advanced Algorithms", "10:30 - 12:00", today, false),
        class("sc-def-3", "default", "break-1", "Lunch Break", "12:00 - 13:00", today, true),
        class("sc-def-4", "default", "c-def-3", "Machine Learning", "13:00 - 14:30", today, false),
        class("sc-def-5", "default", "break-2", "Free Period", "14:30 - 16:00", today, true),
        class("sc-def-6", "default", "c-def-4", "Project Work", "16:00 - 17:30", today, false),
        class("sc-mit-1", "mit", "c-mit-1", "Intro to Quantum Computing", "10:00 - 11:30", today, false),
        class("sc-mit-2", "mit", "c-mit-2", "AI Ethics and Governance", "13:00 - 14:30", today, false),
        class("sc-stan-1", "stanford", "c-stan-1", "Human-Computer Interaction", "09:30 - 11:00", today, false),
        class("sc-stan-2", "stanford", "c-stan-2", "Startup Engineering", "14:00 - 16:00", today, false),
    ];

    LedgerState {
        institutions,
        teachers,
        courses,
        students,
        scheduled_classes,
        attendance_records: Vec::new(),
    }
}
