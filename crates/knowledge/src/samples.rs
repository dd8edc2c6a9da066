//! Built-in sample solutions for seeding an empty knowledge base.
//!
//! Written for the EH ice cube machine family; `seed_samples` stores each
//! one under every configured device model.

pub struct SampleSolution {
    pub problem: &'static str,
    pub solution: &'static str,
    pub manual_reference: &'static str,
}

pub const SAMPLE_SOLUTIONS: &[SampleSolution] = &[
    SampleSolution {
        problem: "Machine won't turn on, no power response",
        solution: "Check that the power cord is firmly seated and the outlet is live. \
                   Hold the power button for 30 seconds to reset the control board, then switch on again.",
        manual_reference: "EH Series Service Manual - Section 3.1 Power",
    },
    SampleSolution {
        problem: "Machine runs but is not making ice",
        solution: "Make sure the water reservoir is filled above the MIN line and the inlet valve is open. \
                   After a restart, allow 15 minutes for the first ice cycle.",
        manual_reference: "EH Series Service Manual - Section 4.2 Ice Production",
    },
    SampleSolution {
        problem: "Ice cubes are small, hollow or cloudy",
        solution: "Run the cleaning cycle with descaling solution to clear mineral build-up on the evaporator, \
                   then check the water inlet filter for clogging.",
        manual_reference: "EH Series Service Manual - Section 6.1 Cleaning and Descaling",
    },
    SampleSolution {
        problem: "Water leaking under the machine",
        solution: "Check that the drain plug is fully seated and the drain hose is not kinked. \
                   Level the machine so meltwater flows to the drain.",
        manual_reference: "EH Series Service Manual - Section 5.3 Drainage",
    },
    SampleSolution {
        problem: "App cannot find the machine on WiFi",
        solution: "Hold the WiFi button for 5 seconds until the indicator blinks, \
                   then add the machine again in the app while connected to a 2.4 GHz network.",
        manual_reference: "Wireless Setup Guide - Section 2",
    },
    SampleSolution {
        problem: "Loud noise or rattling while running",
        solution: "Place the machine on a level surface with 10 cm of clearance on every side for ventilation, \
                   and remove any ice lumps blocking the ice basket or fan.",
        manual_reference: "EH Series Service Manual - Section 7.4 Noise",
    },
];
