use crate::model::*;

/// Flag every slot that overlaps a live appointment as busy. Slots are never
/// dropped; touching endpoints do not count as overlap. Cancelled
/// appointments are ignored even if the caller passes them in.
pub fn mark_availability(mut slots: Vec<Slot>, appointments: &[Appointment]) -> Vec<Slot> {
    for slot in slots.iter_mut() {
        slot.is_free = !appointments
            .iter()
            .any(|a| a.status.occupies_time() && slot.span.overlaps(&a.span));
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::slots::generate_slots;
    use ulid::Ulid;

    const H: Ms = 60 * MINUTE_MS;
    const D: Ms = 30 * MINUTE_MS;

    fn appt(start: Ms, end: Ms, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Ulid::new(),
            employee_id: Ulid::nil(),
            service_id: Ulid::nil(),
            client_id: Ulid::nil(),
            span: Span::new(start, end),
            status,
            comment: String::new(),
        }
    }

    fn busy_starts(slots: &[Slot]) -> Vec<Ms> {
        slots.iter().filter(|s| !s.is_free).map(|s| s.span.start).collect()
    }

    #[test]
    fn exact_slot_booking_marks_one() {
        let slots = generate_slots(&Span::new(9 * H, 18 * H), D);
        let marked = mark_availability(slots, &[appt(10 * H, 10 * H + D, AppointmentStatus::Confirmed)]);
        assert_eq!(marked.len(), 18);
        assert_eq!(busy_starts(&marked), vec![10 * H]);
    }

    #[test]
    fn straddling_booking_marks_both_neighbours() {
        let slots = generate_slots(&Span::new(9 * H, 12 * H), D);
        let marked = mark_availability(
            slots,
            &[appt(10 * H + 15 * MINUTE_MS, 10 * H + 45 * MINUTE_MS, AppointmentStatus::Pending)],
        );
        assert_eq!(busy_starts(&marked), vec![10 * H, 10 * H + D]);
    }

    #[test]
    fn free_iff_no_strict_overlap() {
        let slots = generate_slots(&Span::new(9 * H, 13 * H), D);
        let appointments = vec![
            appt(8 * H, 9 * H, AppointmentStatus::Confirmed), // ends at window start
            appt(9 * H + 50 * MINUTE_MS, 10 * H + 10 * MINUTE_MS, AppointmentStatus::Confirmed),
            appt(11 * H, 12 * H + 1, AppointmentStatus::Confirmed),
            appt(12 * H + D, 13 * H, AppointmentStatus::Cancelled),
        ];
        let marked = mark_availability(slots, &appointments);
        for slot in &marked {
            let expected_busy = appointments
                .iter()
                .any(|a| a.status.occupies_time() && slot.span.start < a.span.end && slot.span.end > a.span.start);
            assert_eq!(slot.is_free, !expected_busy, "slot at {}", slot.span.start);
        }
        assert_eq!(
            busy_starts(&marked),
            vec![9 * H + D, 10 * H, 11 * H, 11 * H + D, 12 * H]
        );
    }
}
